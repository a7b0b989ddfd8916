//! Classification of model output that is supposed to be JSON.
//!
//! Syntax failures and schema failures are reported separately; neither is an
//! HTTP error.

use std::collections::HashMap;

use jsonschema::Validator;
use log::{debug, error};
use once_cell::sync::Lazy;
use serde::Serialize;
use serde_json::{json, Value};

/// Tools whose prompt asks for a JSON document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtractionKind {
    Invoice,
    Receipt,
    Resume,
    BusinessCard,
    BankStatement,
    ContractClauses,
}

impl ExtractionKind {
    pub const ALL: [ExtractionKind; 6] = [
        ExtractionKind::Invoice,
        ExtractionKind::Receipt,
        ExtractionKind::Resume,
        ExtractionKind::BusinessCard,
        ExtractionKind::BankStatement,
        ExtractionKind::ContractClauses,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ExtractionKind::Invoice => "invoice",
            ExtractionKind::Receipt => "receipt",
            ExtractionKind::Resume => "resume",
            ExtractionKind::BusinessCard => "business card",
            ExtractionKind::BankStatement => "bank statement",
            ExtractionKind::ContractClauses => "contract clauses",
        }
    }

    fn schema(self) -> Value {
        let text = json!({ "type": ["string", "null"] });
        let number = json!({ "type": ["number", "null"] });
        let strings = json!({ "type": "array", "items": { "type": "string" } });
        match self {
            ExtractionKind::Invoice => json!({
                "type": "object",
                "properties": {
                    "invoiceNumber": text,
                    "invoiceDate": text,
                    "dueDate": text,
                    "vendor": { "type": ["object", "null"] },
                    "customer": { "type": ["object", "null"] },
                    "lineItems": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "description": text,
                                "quantity": number,
                                "unitPrice": number,
                                "total": number
                            }
                        }
                    },
                    "subtotal": number,
                    "tax": number,
                    "total": number,
                    "currency": text
                }
            }),
            ExtractionKind::Receipt => json!({
                "type": "object",
                "properties": {
                    "merchant": { "type": ["object", "null"] },
                    "date": text,
                    "time": text,
                    "items": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": { "name": text, "quantity": number, "price": number }
                        }
                    },
                    "subtotal": number,
                    "tax": number,
                    "total": number,
                    "paymentMethod": text,
                    "currency": text
                }
            }),
            ExtractionKind::Resume => json!({
                "type": "object",
                "properties": {
                    "name": text,
                    "email": text,
                    "phone": text,
                    "location": text,
                    "summary": text,
                    "experience": { "type": "array", "items": { "type": "object" } },
                    "education": { "type": "array", "items": { "type": "object" } },
                    "skills": strings,
                    "languages": strings,
                    "certifications": strings
                }
            }),
            ExtractionKind::BusinessCard => json!({
                "type": "object",
                "properties": {
                    "name": text,
                    "title": text,
                    "company": text,
                    "email": text,
                    "phone": text,
                    "mobile": text,
                    "website": text,
                    "address": text,
                    "socialMedia": { "type": ["object", "null"] }
                }
            }),
            ExtractionKind::BankStatement => json!({
                "type": "object",
                "properties": {
                    "bankName": text,
                    "accountHolder": text,
                    "accountNumber": text,
                    "statementPeriod": { "type": ["object", "null"] },
                    "openingBalance": number,
                    "closingBalance": number,
                    "currency": text,
                    "transactions": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "date": text,
                                "description": text,
                                "debit": number,
                                "credit": number,
                                "balance": number
                            }
                        }
                    }
                }
            }),
            ExtractionKind::ContractClauses => json!({
                "type": "object",
                "required": ["clauses"],
                "properties": {
                    "clauses": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "required": ["type", "found"],
                            "properties": {
                                "type": { "type": "string" },
                                "found": { "type": "boolean" },
                                "text": text,
                                "summary": text
                            }
                        }
                    }
                }
            }),
        }
    }
}

static VALIDATORS: Lazy<HashMap<ExtractionKind, Validator>> = Lazy::new(|| {
    ExtractionKind::ALL
        .into_iter()
        .filter_map(|kind| match jsonschema::validator_for(&kind.schema()) {
            Ok(validator) => Some((kind, validator)),
            Err(e) => {
                error!("Schema for {} does not compile: {}", kind.name(), e);
                None
            }
        })
        .collect()
});

/// Outcome of reading a completion as a tool's JSON document.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    /// Parsed and matches the tool's schema.
    Structured(Value),
    /// Parsed, but does not match the schema.
    SchemaMismatch { value: Value, errors: Vec<String> },
    /// Not JSON at all.
    Unstructured { reason: String },
}

impl Extraction {
    pub fn classify(kind: ExtractionKind, content: &str) -> Self {
        let value: Value = match serde_json::from_str(content) {
            Ok(value) => value,
            Err(e) => {
                debug!("{} output is not JSON: {}", kind.name(), e);
                return Extraction::Unstructured {
                    reason: e.to_string(),
                };
            }
        };

        let Some(validator) = VALIDATORS.get(&kind) else {
            return Extraction::Structured(value);
        };

        let errors: Vec<String> = match validator.validate(&value) {
            Ok(()) => Vec::new(),
            Err(errors) => errors
                .map(|e| format!("{}: {}", e.instance_path, e))
                .collect(),
        };

        if errors.is_empty() {
            Extraction::Structured(value)
        } else {
            debug!("{} output failed schema validation: {:?}", kind.name(), errors);
            Extraction::SchemaMismatch { value, errors }
        }
    }

    /// The parsed document, whenever the content was syntactically valid JSON.
    pub fn parsed_data(&self) -> Option<&Value> {
        match self {
            Extraction::Structured(value) | Extraction::SchemaMismatch { value, .. } => Some(value),
            Extraction::Unstructured { .. } => None,
        }
    }

    pub fn into_parts(self) -> (Option<Value>, ExtractionReport) {
        match self {
            Extraction::Structured(value) => (
                Some(value),
                ExtractionReport {
                    status: ExtractionStatus::Structured,
                    errors: None,
                },
            ),
            Extraction::SchemaMismatch { value, errors } => (
                Some(value),
                ExtractionReport {
                    status: ExtractionStatus::SchemaMismatch,
                    errors: Some(errors),
                },
            ),
            Extraction::Unstructured { reason } => (
                None,
                ExtractionReport {
                    status: ExtractionStatus::Unstructured,
                    errors: Some(vec![reason]),
                },
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStatus {
    Structured,
    SchemaMismatch,
    Unstructured,
}

/// The `extraction` field of a structured tool response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionReport {
    pub status: ExtractionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_schemas_compile() {
        for kind in ExtractionKind::ALL {
            assert!(VALIDATORS.contains_key(&kind), "{} schema missing", kind.name());
        }
    }

    #[test]
    fn valid_invoice_is_structured() {
        let content = r#"{"invoiceNumber":"INV-1001","total":1050.5,"currency":"AED","lineItems":[{"description":"Consulting","quantity":1,"unitPrice":1000,"total":1000}]}"#;
        let extraction = Extraction::classify(ExtractionKind::Invoice, content);
        assert!(matches!(extraction, Extraction::Structured(_)));
        assert_eq!(extraction.parsed_data().unwrap()["invoiceNumber"], "INV-1001");
    }

    #[test]
    fn wrong_types_are_a_schema_mismatch_with_data() {
        let content = r#"{"invoiceNumber":"INV-1","total":"one thousand"}"#;
        let extraction = Extraction::classify(ExtractionKind::Invoice, content);
        let Extraction::SchemaMismatch { value, errors } = &extraction else {
            panic!("expected schema mismatch, got {extraction:?}");
        };
        assert_eq!(value["total"], "one thousand");
        assert!(errors.iter().any(|e| e.contains("/total")));
        assert!(extraction.parsed_data().is_some());
    }

    #[test]
    fn prose_is_unstructured() {
        let extraction = Extraction::classify(ExtractionKind::Receipt, "Here is the receipt data: total 12 AED");
        assert!(extraction.parsed_data().is_none());
        let (parsed, report) = extraction.into_parts();
        assert!(parsed.is_none());
        assert_eq!(report.status, ExtractionStatus::Unstructured);
    }

    #[test]
    fn fenced_json_is_not_json() {
        let content = "```json\n{\"name\":\"Sara\"}\n```";
        assert!(matches!(
            Extraction::classify(ExtractionKind::BusinessCard, content),
            Extraction::Unstructured { .. }
        ));
    }

    #[test]
    fn clause_results_require_type_and_found() {
        let ok = r#"{"clauses":[{"type":"Termination","found":true,"text":"Either party may...","summary":null}]}"#;
        assert!(matches!(
            Extraction::classify(ExtractionKind::ContractClauses, ok),
            Extraction::Structured(_)
        ));

        let missing = r#"{"clauses":[{"type":"Termination"}]}"#;
        assert!(matches!(
            Extraction::classify(ExtractionKind::ContractClauses, missing),
            Extraction::SchemaMismatch { .. }
        ));
    }

    #[test]
    fn report_serializes_snake_case_status() {
        let (_, report) = Extraction::classify(ExtractionKind::Resume, r#"{"skills":"rust"}"#).into_parts();
        let value = serde_json::to_value(report).unwrap();
        assert_eq!(value["status"], "schema_mismatch");
        assert!(value["errors"].as_array().is_some_and(|e| !e.is_empty()));
    }
}
