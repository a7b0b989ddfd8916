//! Prompt construction for each document tool.
//!
//! Builders are pure: they return the messages and options a wrapper sends,
//! so prompt content can be checked without a network.

use serde::Deserialize;

use crate::config::EXTRACTION_TEMPERATURE;

use super::types::{ChatMessage, CompletionOptions, Role};

/// Clause types searched when the caller does not name any.
pub const DEFAULT_CLAUSE_TYPES: [&str; 10] = [
    "Termination",
    "Confidentiality",
    "Indemnification",
    "Limitation of Liability",
    "Governing Law",
    "Dispute Resolution",
    "Force Majeure",
    "Intellectual Property",
    "Payment Terms",
    "Non-Compete",
];

#[derive(Debug, Clone, PartialEq)]
pub struct ToolPrompt {
    pub messages: Vec<ChatMessage>,
    pub options: CompletionOptions,
}

impl ToolPrompt {
    fn new(system: String, user: String, options: CompletionOptions) -> Self {
        Self {
            messages: vec![ChatMessage::system(system), ChatMessage::user(user)],
            options,
        }
    }

    fn extraction(system: &str, text: &str) -> Self {
        Self::new(
            system.to_string(),
            text.to_string(),
            CompletionOptions::default().with_temperature(EXTRACTION_TEMPERATURE),
        )
    }

    pub fn system_prompt(&self) -> &str {
        self.messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryLength {
    Short,
    #[default]
    Medium,
    Long,
}

impl SummaryLength {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "short" => Some(Self::Short),
            "medium" => Some(Self::Medium),
            "long" => Some(Self::Long),
            _ => None,
        }
    }

    fn instruction(self) -> &'static str {
        match self {
            Self::Short => "Write a brief summary of 2-3 sentences capturing only the essential point.",
            Self::Medium => "Write a concise summary of one or two paragraphs covering the main points.",
            Self::Long => {
                "Write a detailed summary with a short overview paragraph followed by bullet points \
                 for every key point, figure, date and obligation."
            }
        }
    }
}

pub fn summarize(text: &str, length: SummaryLength, language: Option<&str>) -> ToolPrompt {
    let mut system = format!(
        "You are an expert document analyst. Summarize the document provided by the user. {}",
        length.instruction()
    );
    match language {
        Some(language) => system.push_str(&format!(" Write the summary in {language}.")),
        None => system.push_str(" Write the summary in the same language as the document."),
    }
    ToolPrompt::new(system, text.to_string(), CompletionOptions::default())
}

pub fn translate(text: &str, target_language: &str, source_language: Option<&str>) -> ToolPrompt {
    let source = match source_language {
        Some(source) => format!("from {source} "),
        None => String::new(),
    };
    let system = format!(
        "You are a professional translator specialising in business and legal documents. \
         Translate the text provided by the user {source}into {target_language}. Preserve the \
         original formatting, numbers, names and line breaks. Return only the translation, \
         without commentary."
    );
    ToolPrompt::new(
        system,
        text.to_string(),
        CompletionOptions::default().with_max_tokens(4000),
    )
}

const INVOICE_PROMPT: &str = r#"You extract structured data from invoice text (English or Arabic, GCC VAT invoices included).
Return ONLY a JSON object, no markdown, with this shape:
{
  "invoiceNumber": string|null,
  "invoiceDate": string|null,
  "dueDate": string|null,
  "vendor": { "name": string|null, "address": string|null, "taxId": string|null },
  "customer": { "name": string|null, "address": string|null, "taxId": string|null },
  "lineItems": [ { "description": string, "quantity": number|null, "unitPrice": number|null, "total": number|null } ],
  "subtotal": number|null,
  "tax": number|null,
  "total": number|null,
  "currency": string|null
}
Use null for anything not present in the text. Dates in ISO 8601 (YYYY-MM-DD) when possible."#;

const RECEIPT_PROMPT: &str = r#"You extract structured data from receipt text produced by OCR, which may contain noise.
Return ONLY a JSON object, no markdown, with this shape:
{
  "merchant": { "name": string|null, "address": string|null, "phone": string|null },
  "date": string|null,
  "time": string|null,
  "items": [ { "name": string, "quantity": number|null, "price": number|null } ],
  "subtotal": number|null,
  "tax": number|null,
  "total": number|null,
  "paymentMethod": string|null,
  "currency": string|null
}
Use null for anything not present in the text."#;

const RESUME_PROMPT: &str = r#"You parse resumes and CVs into structured data.
Return ONLY a JSON object, no markdown, with this shape:
{
  "name": string|null,
  "email": string|null,
  "phone": string|null,
  "location": string|null,
  "summary": string|null,
  "experience": [ { "title": string, "company": string|null, "startDate": string|null, "endDate": string|null, "description": string|null } ],
  "education": [ { "degree": string, "institution": string|null, "year": string|null } ],
  "skills": [string],
  "languages": [string],
  "certifications": [string]
}
Use null or empty arrays for anything not present in the text."#;

const BUSINESS_CARD_PROMPT: &str = r#"You extract contact details from OCR text of a business card (English and/or Arabic).
Return ONLY a JSON object, no markdown, with this shape:
{
  "name": string|null,
  "title": string|null,
  "company": string|null,
  "email": string|null,
  "phone": string|null,
  "mobile": string|null,
  "website": string|null,
  "address": string|null,
  "socialMedia": { "linkedin": string|null, "twitter": string|null }
}
Use null for anything not present in the text."#;

const BANK_STATEMENT_PROMPT: &str = r#"You extract structured data from bank statement text.
Return ONLY a JSON object, no markdown, with this shape:
{
  "bankName": string|null,
  "accountHolder": string|null,
  "accountNumber": string|null,
  "statementPeriod": { "from": string|null, "to": string|null },
  "openingBalance": number|null,
  "closingBalance": number|null,
  "currency": string|null,
  "transactions": [ { "date": string|null, "description": string, "debit": number|null, "credit": number|null, "balance": number|null } ]
}
Mask all but the last four digits of account numbers. Use null for anything not present in the text."#;

pub fn extract_invoice(text: &str) -> ToolPrompt {
    ToolPrompt::extraction(INVOICE_PROMPT, text)
}

pub fn extract_receipt(text: &str) -> ToolPrompt {
    ToolPrompt::extraction(RECEIPT_PROMPT, text)
}

pub fn parse_resume(text: &str) -> ToolPrompt {
    ToolPrompt::extraction(RESUME_PROMPT, text)
}

pub fn scan_business_card(text: &str) -> ToolPrompt {
    ToolPrompt::extraction(BUSINESS_CARD_PROMPT, text)
}

pub fn extract_bank_statement(text: &str) -> ToolPrompt {
    ToolPrompt::extraction(BANK_STATEMENT_PROMPT, text)
}

pub fn analyze_contract(text: &str) -> ToolPrompt {
    let system = "You are an experienced commercial lawyer reviewing a contract for a business client in the GCC. \
                  Produce a structured analysis in Markdown with these sections: Parties, Contract Type and Term, \
                  Key Obligations, Payment Terms, Termination, Risks and Red Flags (rate each High/Medium/Low), \
                  Missing or Unusual Clauses, and Recommendations. Quote the contract where it matters. \
                  This is not legal advice; say so in one line at the end.";
    ToolPrompt::new(
        system.to_string(),
        text.to_string(),
        CompletionOptions::default().with_max_tokens(4000),
    )
}

pub fn analyze_policy(text: &str) -> ToolPrompt {
    let system = "You analyse insurance, HR and corporate policy documents. In Markdown, explain: what the policy \
                  covers, key exclusions and limitations, obligations of each party, deadlines and notice periods, \
                  and anything a reader should clarify before relying on it. Keep the language plain.";
    ToolPrompt::new(
        system.to_string(),
        text.to_string(),
        CompletionOptions::default().with_max_tokens(3000),
    )
}

pub fn find_contract_clauses(text: &str, clause_types: Option<&[String]>) -> ToolPrompt {
    let clause_list = match clause_types {
        Some(types) if !types.is_empty() => types.join(", "),
        _ => DEFAULT_CLAUSE_TYPES.join(", "),
    };
    let system = format!(
        "You locate clauses in contracts. Search the contract provided by the user for these clause types: \
         {clause_list}.\n\
         Return ONLY a JSON object, no markdown, with this shape:\n\
         {{\n  \"clauses\": [ {{ \"type\": string, \"found\": boolean, \"text\": string|null, \"summary\": string|null }} ]\n}}\n\
         Include exactly one entry per requested clause type, in the order given. Quote clause text verbatim."
    );
    ToolPrompt::new(
        system,
        text.to_string(),
        CompletionOptions::default()
            .with_temperature(EXTRACTION_TEMPERATURE)
            .with_max_tokens(4000),
    )
}

pub fn compare_documents(first: &str, second: &str) -> ToolPrompt {
    let system = "You compare two versions of a document. In Markdown, list: additions, removals, changed terms \
                  (with before/after), and the practical impact of each change. Finish with a one-paragraph verdict.";
    let user = format!("DOCUMENT 1:\n{first}\n\nDOCUMENT 2:\n{second}");
    ToolPrompt::new(
        system.to_string(),
        user,
        CompletionOptions::default().with_max_tokens(3000),
    )
}

/// Chat over a document. History entries with a `system` role are dropped so
/// callers cannot replace the grounding prompt.
pub fn chat_with_document(document_text: &str, question: &str, history: &[ChatMessage]) -> ToolPrompt {
    let system = format!(
        "You are a helpful assistant answering questions about the document below. Answer only from the \
         document; if the answer is not in it, say so. Cite the relevant passage when useful.\n\n\
         DOCUMENT:\n{document_text}"
    );
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(system));
    messages.extend(history.iter().filter(|m| m.role != Role::System).cloned());
    messages.push(ChatMessage::user(question));
    ToolPrompt {
        messages,
        options: CompletionOptions::default(),
    }
}
