use crate::analyzer::ChangeAnalysisResult;
use crate::config::AutoReleaseConfig;
use crate::domain::{Bump, Version};
use serde::Serialize;

/// A named bump rule evaluated against the change analysis
pub struct VersionRule {
    pub name: String,
    pub priority: i32,
    pub bump: Bump,
    pub predicate: Box<dyn Fn(&ChangeAnalysisResult) -> bool + Send + Sync>,
}

/// The engine's verdict for one release
#[derive(Debug, Clone, Serialize)]
pub struct VersionDecision {
    pub current: Version,
    pub new: Version,
    pub bump: Bump,
    pub reason: String,
    pub confidence: f64,
    pub requires_approval: bool,
}

/// Turns a change analysis into a concrete version decision.
///
/// Rules are evaluated in descending priority order and the first match
/// wins; when nothing matches the version stays put. Callers can register
/// additional rules via [VersionEngine::add_rule], which compete with the
/// defaults on priority alone.
pub struct VersionEngine {
    rules: Vec<VersionRule>,
    policy: AutoReleaseConfig,
}

impl VersionEngine {
    pub fn new(policy: AutoReleaseConfig) -> Self {
        let mut engine = VersionEngine {
            rules: Vec::new(),
            policy,
        };
        engine.add_default_rules();
        engine
    }

    fn add_default_rules(&mut self) {
        self.add_rule(VersionRule {
            name: "breaking_change".to_string(),
            priority: 100,
            bump: Bump::Major,
            predicate: Box::new(|r| r.breaking_changes > 0),
        });
        self.add_rule(VersionRule {
            name: "new_features".to_string(),
            priority: 80,
            bump: Bump::Minor,
            predicate: Box::new(|r| r.new_features > 0),
        });
        self.add_rule(VersionRule {
            name: "bug_fixes".to_string(),
            priority: 60,
            bump: Bump::Patch,
            predicate: Box::new(|r| {
                r.bug_fixes > 0 && r.new_features == 0 && r.breaking_changes == 0
            }),
        });
        self.add_rule(VersionRule {
            name: "large_changes".to_string(),
            priority: 50,
            bump: Bump::Minor,
            predicate: Box::new(|r| r.files_modified > 20 || r.lines_added > 1000),
        });
        self.add_rule(VersionRule {
            name: "minor_changes".to_string(),
            priority: 40,
            bump: Bump::Patch,
            predicate: Box::new(|r| r.other_changes > 0 && r.new_features == 0 && r.bug_fixes == 0),
        });
    }

    /// Register an additional rule; priority decides where it lands
    pub fn add_rule(&mut self, rule: VersionRule) {
        self.rules.push(rule);
        self.rules.sort_by(|a, b| b.priority.cmp(&a.priority));
    }

    /// Decide the next version for `current` given the analysis.
    ///
    /// # Returns
    /// A [VersionDecision] carrying the matched bump, a human-readable
    /// reason, and whether the change profile warrants manual approval.
    pub fn decide(&self, current: &Version, analysis: &ChangeAnalysisResult) -> VersionDecision {
        let bump = self.evaluate_rules(analysis);
        let new = current.bump(bump);

        VersionDecision {
            current: current.clone(),
            new,
            bump,
            reason: generate_reason(analysis, bump),
            confidence: analysis.confidence,
            requires_approval: self.needs_approval(analysis, bump),
        }
    }

    fn evaluate_rules(&self, analysis: &ChangeAnalysisResult) -> Bump {
        self.rules
            .iter()
            .find(|rule| (rule.predicate)(analysis))
            .map(|rule| rule.bump)
            .unwrap_or(Bump::None)
    }

    fn needs_approval(&self, analysis: &ChangeAnalysisResult, bump: Bump) -> bool {
        if bump == Bump::Major || analysis.breaking_changes > 0 {
            return true;
        }
        if analysis.files_modified > self.policy.max_files_changed
            || analysis.lines_added > self.policy.max_lines_added
        {
            return true;
        }
        self.policy.require_approval && analysis.confidence < self.policy.approval_threshold
    }
}

fn generate_reason(analysis: &ChangeAnalysisResult, bump: Bump) -> String {
    let mut reasons = Vec::new();
    if analysis.breaking_changes > 0 {
        reasons.push(format!("{} breaking change(s)", analysis.breaking_changes));
    }
    if analysis.new_features > 0 {
        reasons.push(format!("{} new feature(s)", analysis.new_features));
    }
    if analysis.bug_fixes > 0 {
        reasons.push(format!("{} bug fix(es)", analysis.bug_fixes));
    }
    if reasons.is_empty() {
        reasons.push("routine maintenance changes".to_string());
    }
    format!("Bump type: {}. Reason: {}", bump, reasons.join(", "))
}
