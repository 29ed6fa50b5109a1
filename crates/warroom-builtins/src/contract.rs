use crate::{str_arg, tool_error};
use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use warroom_core::{ToolCall, ToolResult, WarroomError, WarroomResult};
use warroom_security::{Capability, WorkspaceGuard};
use warroom_skills::{Skill, SkillDescriptor};

/// Answer returned when a document has no matching section.
pub const NO_SUCH_CLAUSE: &str = "No such clause found.";

/// Document-analysis oracle: `(document, clause type) -> text`.
#[async_trait]
pub trait DocumentOracle: Send + Sync {
    /// Quote and interpret the `clause_type` clause of `document`.
    async fn analyze_clause(&self, document: &str, clause_type: &str) -> WarroomResult<String>;
}

/// One numbered section of a contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Section number as written (`2`, `7.B`).
    pub number: String,
    /// Heading text after the number.
    pub heading: String,
    /// Body lines, joined with spaces.
    pub body: String,
}

/// [`DocumentOracle`] over plain-text contracts in a local directory.
///
/// Sections start with a numbered heading line (`2. EXCLUSIVITY`,
/// `7.B FORCE MAJEURE ...`). A clause matches when its heading contains the
/// requested clause type, case-insensitively.
pub struct ClauseIndexOracle {
    docs: WorkspaceGuard,
    heading: Regex,
    timeframe: Regex,
}

impl ClauseIndexOracle {
    /// Oracle reading documents from `docs_dir`.
    pub fn new(docs_dir: impl Into<PathBuf>) -> WarroomResult<Self> {
        let heading = Regex::new(r"^\s*(\d+(?:\.[A-Z0-9]+)?)\.?\s+([A-Z][A-Z0-9 &/()\-]+)\s*$")
            .map_err(|e| WarroomError::Config(e.to_string()))?;
        let timeframe = Regex::new(r"(?i)([<>]=?\s*)?\d+\s+(?:business\s+)?days")
            .map_err(|e| WarroomError::Config(e.to_string()))?;
        Ok(Self {
            docs: WorkspaceGuard::new(docs_dir),
            heading,
            timeframe,
        })
    }

    /// Split a contract into its numbered sections.
    pub fn sections(&self, text: &str) -> Vec<Section> {
        let mut sections: Vec<Section> = Vec::new();
        for line in text.lines() {
            if let Some(caps) = self.heading.captures(line) {
                sections.push(Section {
                    number: caps[1].to_string(),
                    heading: caps[2].trim().to_string(),
                    body: String::new(),
                });
                continue;
            }
            let line = line.trim();
            if line.is_empty() || line.starts_with('[') {
                continue;
            }
            if let Some(current) = sections.last_mut() {
                if !current.body.is_empty() {
                    current.body.push(' ');
                }
                current.body.push_str(line);
            }
        }
        sections
    }

    fn interpret(&self, section: &Section) -> Vec<String> {
        let body = section.body.to_lowercase();
        let mut notes = Vec::new();
        for m in self.timeframe.find_iter(&section.body) {
            notes.push(format!("Timeframe condition: {}.", m.as_str().trim()));
        }
        if body.contains("exclusively") || body.contains("breach") {
            notes.push(
                "Restriction: purchases outside the named vendor are a breach of contract."
                    .to_string(),
            );
        }
        if body.contains("voided") || body.contains("suspended") {
            notes.push(
                "Exception: when the condition is met, the referenced obligation no longer applies."
                    .to_string(),
            );
        }
        if body.contains("alternate vendors") || (body.contains("third parties") && body.contains("may")) {
            notes.push("Permission: the buyer may source from alternate vendors.".to_string());
        }
        if notes.is_empty() {
            notes.push("No explicit conditions or exceptions stated.".to_string());
        }
        notes
    }

    async fn load(&self, document: &str) -> WarroomResult<String> {
        let path = self.docs.resolve(document)?;
        if tokio::fs::try_exists(&path).await? {
            return Ok(tokio::fs::read_to_string(&path).await?);
        }
        // Documents are stored as text; accept the name of the original PDF.
        let text_path = path.with_extension("txt");
        if text_path != path && tokio::fs::try_exists(&text_path).await? {
            return Ok(tokio::fs::read_to_string(&text_path).await?);
        }
        Err(WarroomError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("document {document} not found"),
        )))
    }
}

#[async_trait]
impl DocumentOracle for ClauseIndexOracle {
    async fn analyze_clause(&self, document: &str, clause_type: &str) -> WarroomResult<String> {
        info!(document = %document, clause = %clause_type, "Analyzing contract clause");
        let text = self.load(document).await?;
        let wanted = clause_type.trim().to_lowercase();
        if wanted.is_empty() {
            return Ok(NO_SUCH_CLAUSE.to_string());
        }

        let Some(section) = self
            .sections(&text)
            .into_iter()
            .find(|s| s.heading.to_lowercase().contains(&wanted))
        else {
            return Ok(NO_SUCH_CLAUSE.to_string());
        };

        let mut answer = format!(
            "Clause {} ({}) of {document}:\n\"{}\"\n\nInterpretation:",
            section.number, section.heading, section.body
        );
        for note in self.interpret(&section) {
            answer.push_str("\n- ");
            answer.push_str(&note);
        }
        Ok(answer)
    }
}

/// `analyze_contract_clause`: ask the oracle about one clause.
pub struct AnalyzeContractSkill {
    descriptor: SkillDescriptor,
    oracle: Arc<dyn DocumentOracle>,
}

impl AnalyzeContractSkill {
    /// Skill over `oracle`.
    pub fn new(oracle: Arc<dyn DocumentOracle>) -> Self {
        Self {
            descriptor: SkillDescriptor {
                name: "analyze_contract_clause".to_string(),
                description: "Extract and interpret a specific clause of a legal document."
                    .to_string(),
                parameters_schema: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "doc_name": {"type": "string", "description": "Document file name"},
                        "clause_type": {"type": "string", "description": "e.g. 'Exclusivity', 'Force Majeure'"}
                    },
                    "required": ["doc_name", "clause_type"]
                }),
                required_capabilities: vec![Capability::DocumentAnalysis],
            },
            oracle,
        }
    }
}

#[async_trait]
impl Skill for AnalyzeContractSkill {
    fn descriptor(&self) -> &SkillDescriptor {
        &self.descriptor
    }

    async fn execute(&self, call: ToolCall) -> WarroomResult<ToolResult> {
        let (Some(doc), Some(clause)) = (str_arg(&call, "doc_name"), str_arg(&call, "clause_type"))
        else {
            return Ok(tool_error(&call, "Missing 'doc_name' or 'clause_type'"));
        };
        match self.oracle.analyze_clause(doc, clause).await {
            Ok(text) => Ok(ToolResult::success(&call.id, text)),
            Err(e) => Ok(tool_error(&call, format!("Error analyzing contract: {e}"))),
        }
    }
}

/// File name of the demo supply agreement.
pub const SUPPLY_AGREEMENT: &str = "Master_Supply_Agreement_NVIDIA.txt";
/// File name of the demo warehouse manual.
pub const WAREHOUSE_MANUAL: &str = "Warehouse_Policy_Manual_1998.txt";

/// Write the demo documents into `dir`: a supply agreement whose
/// exclusivity clause is voided by a non-performance exception, and the
/// warehouse manual explaining the legacy status codes.
pub async fn write_demo_documents(dir: &Path) -> WarroomResult<Vec<PathBuf>> {
    tokio::fs::create_dir_all(dir).await?;

    let agreement = "\
MASTER SUPPLY AGREEMENT - CONFIDENTIAL
VENDOR: NVIDIA CORP | BUYER: YOUR_COMPANY

2. EXCLUSIVITY
Buyer agrees to purchase all GPU hardware exclusively from Vendor.
Purchasing from third parties or spot markets is a breach of contract.

[...Standard boilerplate omitted for brevity...]

7.B FORCE MAJEURE / NON-PERFORMANCE & EXCEPTIONS
In the event that Vendor fails to deliver agreed units for > 60 days,
the Exclusivity clause (Section 2) is temporarily voided.
Buyer may source units from alternate vendors until backlog is cleared.
";

    let manual = "\
WAREHOUSE OPERATIONS MANUAL (REV 1998)

4. STATUS CODES
CODE 0: Available for Pick
CODE 1: Reserved for VIP
CODE 9: LEGAL HOLD / QUARANTINE
Items with Code 9 are physically present but legally frozen.
Release requires valid Override Authorization.
";

    let mut written = Vec::new();
    for (name, body) in [(SUPPLY_AGREEMENT, agreement), (WAREHOUSE_MANUAL, manual)] {
        let path = dir.join(name);
        tokio::fs::write(&path, body).await?;
        info!(file = %path.display(), "Generated demo document");
        written.push(path);
    }
    Ok(written)
}
