use crate::anchor::{Anchor, MatchPolicy};
use crate::locate::EndBoundary;
use crate::plan::{ReplacementPlan, Target};
use crate::verify::RegionCheck;
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Deserialize, Default, Clone)]
pub struct PatchConfig {
    #[serde(default)]
    pub meta: Metadata,
    #[serde(default)]
    pub patches: Vec<PatchDefinition>,
}

impl PatchConfig {
    /// Check every patch and report all problems at once.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.patches.is_empty() {
            issues.push(ValidationIssue::EmptyPatchList);
        }

        let mut seen = HashSet::new();
        for patch in &self.patches {
            if patch.id.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    patch_id: None,
                    field: "id",
                });
            } else if !seen.insert(patch.id.as_str()) {
                issues.push(ValidationIssue::DuplicateId {
                    patch_id: patch.id.clone(),
                });
            }

            if patch.file.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    patch_id: Some(patch.id.clone()),
                    field: "file",
                });
            }

            if let Err(issue) = patch.to_plan() {
                issues.push(issue);
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Metadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Resolve `file` entries against the workspace root instead of the
    /// current directory.
    #[serde(default)]
    pub workspace_relative: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PatchDefinition {
    pub id: String,
    pub file: String,
    #[serde(default)]
    pub start: Option<AnchorSpec>,
    #[serde(default)]
    pub end: Option<AnchorSpec>,
    /// Single anchor whose match is the whole region; excludes start/end.
    #[serde(default)]
    pub span: Option<AnchorSpec>,
    #[serde(default)]
    pub end_boundary: Boundary,
    #[serde(default)]
    pub payload: String,
    #[serde(default)]
    pub strict: bool,
    #[serde(default)]
    pub verify: Option<Verify>,
}

impl PatchDefinition {
    /// Compile this definition into a replacement plan.
    pub fn to_plan(&self) -> Result<ReplacementPlan, ValidationIssue> {
        let target = match (&self.span, &self.start, &self.end) {
            (Some(span), None, None) => {
                if self.end_boundary == Boundary::Inclusive {
                    return Err(self.invalid_combo("end_boundary does not apply to span targets"));
                }
                Target::Span(self.compile_anchor(span, "span")?)
            }
            (Some(_), _, _) => {
                return Err(self.invalid_combo("span cannot be combined with start/end"));
            }
            (None, Some(_), Some(AnchorSpec::Pattern {
                policy: Policy::Only,
                ..
            })) => {
                return Err(self.invalid_combo(
                    "policy = \"only\" applies to start and span anchors, not end",
                ));
            }
            (None, Some(start), Some(end)) => Target::Between {
                start: self.compile_anchor(start, "start")?,
                end: self.compile_anchor(end, "end")?,
                boundary: self.end_boundary.into(),
            },
            (None, None, _) => {
                return Err(ValidationIssue::MissingField {
                    patch_id: Some(self.id.clone()),
                    field: "start",
                });
            }
            (None, Some(_), None) => {
                return Err(ValidationIssue::MissingField {
                    patch_id: Some(self.id.clone()),
                    field: "end",
                });
            }
        };

        let mut plan = ReplacementPlan::new(target)
            .payload(self.payload.clone())
            .strict(self.strict);

        if let Some(verify) = &self.verify {
            plan = plan.expect(self.region_check(verify)?);
        }

        Ok(plan)
    }

    /// Short human description of what this patch targets.
    pub fn describe_target(&self) -> String {
        match (&self.span, &self.start, &self.end) {
            (Some(span), _, _) => format!("span {span}"),
            (None, Some(start), Some(end)) => format!("{start} .. {end}"),
            _ => "<incomplete>".to_string(),
        }
    }

    fn compile_anchor(&self, spec: &AnchorSpec, field: &'static str) -> Result<Anchor, ValidationIssue> {
        match spec {
            AnchorSpec::Literal { text } => {
                if text.is_empty() {
                    return Err(ValidationIssue::MissingField {
                        patch_id: Some(self.id.clone()),
                        field: match field {
                            "start" => "start.text",
                            "end" => "end.text",
                            _ => "span.text",
                        },
                    });
                }
                Ok(Anchor::literal(text.clone()))
            }
            AnchorSpec::Pattern { regex, policy } => {
                Anchor::pattern_with(regex, (*policy).into()).map_err(|e| {
                    ValidationIssue::InvalidPattern {
                        patch_id: self.id.clone(),
                        field,
                        message: e.to_string(),
                    }
                })
            }
        }
    }

    fn region_check(&self, verify: &Verify) -> Result<RegionCheck, ValidationIssue> {
        match verify {
            Verify::ExactMatch { expected_text } => {
                Ok(RegionCheck::ExactMatch(expected_text.clone()))
            }
            Verify::Hash { expected, .. } => RegionCheck::parse_hash(expected).ok_or_else(|| {
                self.invalid_combo(&format!("invalid hash value: {expected}"))
            }),
        }
    }

    fn invalid_combo(&self, message: &str) -> ValidationIssue {
        ValidationIssue::InvalidCombo {
            patch_id: Some(self.id.clone()),
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum AnchorSpec {
    /// Exact text, found verbatim
    Literal { text: String },
    /// Regular expression
    Pattern {
        regex: String,
        #[serde(default)]
        policy: Policy,
    },
}

impl fmt::Display for AnchorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnchorSpec::Literal { text } => write!(f, "{text:?}"),
            AnchorSpec::Pattern { regex, .. } => write!(f, "/{regex}/"),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Policy {
    #[default]
    First,
    Only,
}

impl From<Policy> for MatchPolicy {
    fn from(policy: Policy) -> Self {
        match policy {
            Policy::First => MatchPolicy::First,
            Policy::Only => MatchPolicy::Only,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Boundary {
    #[default]
    Exclusive,
    Inclusive,
}

impl From<Boundary> for EndBoundary {
    fn from(boundary: Boundary) -> Self {
        match boundary {
            Boundary::Exclusive => EndBoundary::Exclusive,
            Boundary::Inclusive => EndBoundary::Inclusive,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Verify {
    ExactMatch {
        expected_text: String,
    },
    Hash {
        algorithm: Option<HashAlgorithm>,
        expected: String,
    },
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum HashAlgorithm {
    Xxh3,
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone)]
pub enum ValidationIssue {
    EmptyPatchList,
    MissingField {
        patch_id: Option<String>,
        field: &'static str,
    },
    DuplicateId {
        patch_id: String,
    },
    InvalidPattern {
        patch_id: String,
        field: &'static str,
        message: String,
    },
    InvalidCombo {
        patch_id: Option<String>,
        message: String,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::EmptyPatchList => write!(f, "patch config contains no patches"),
            ValidationIssue::MissingField { patch_id, field } => match patch_id {
                Some(id) => write!(f, "patch '{id}' missing required field '{field}'"),
                None => write!(f, "patch missing required field '{field}'"),
            },
            ValidationIssue::DuplicateId { patch_id } => {
                write!(f, "patch id '{patch_id}' is used more than once")
            }
            ValidationIssue::InvalidPattern {
                patch_id,
                field,
                message,
            } => write!(f, "patch '{patch_id}' has an invalid {field} pattern: {message}"),
            ValidationIssue::InvalidCombo { patch_id, message } => match patch_id {
                Some(id) => write!(f, "patch '{id}' has invalid configuration: {message}"),
                None => write!(f, "invalid patch configuration: {message}"),
            },
        }
    }
}
