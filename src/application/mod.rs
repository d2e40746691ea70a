// Command plumbing
pub mod commands;
pub mod dispatch;
pub mod plugins;

// Knowledge and search
pub mod knowledge_base;
pub mod optimization;

// Market regime and the self-driving loop
pub mod autonomous;
pub mod regime;

// Background analysis
pub mod monitoring;

pub mod context;
