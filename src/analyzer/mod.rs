pub mod change_analyzer;

pub use change_analyzer::{
    ChangeAnalysisResult, ChangeAnalyzer, ChangeCategory, CommitAnalysis, FileChange,
};
