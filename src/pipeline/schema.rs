//! Canonical column names and record provenance

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::PipelineError;

/// Column carrying the provenance tag (0 = training, 1 = counterfactual, 2 = user)
pub const PROVENANCE_COLUMN: &str = "counterfactual";

/// Target label column
pub const RISK_COLUMN: &str = "risk";

/// Model prediction probability column
pub const PREDICTION_COLUMN: &str = "pred";

pub const AGE: &str = "age";
pub const SEX: &str = "sex";
pub const JOB: &str = "job";
pub const HOUSING: &str = "housing";
pub const SAVING_ACCOUNTS: &str = "saving accounts";
pub const CHECKING_ACCOUNT: &str = "checking account";
pub const CREDIT_AMOUNT: &str = "credit amount";
pub const DURATION: &str = "duration";
pub const PURPOSE: &str = "purpose";

/// One-hot encoded columns, in matrix order
pub const CATEGORICAL_COLUMNS: [&str; 5] = [SEX, HOUSING, SAVING_ACCOUNTS, CHECKING_ACCOUNT, PURPOSE];

/// Ordinal columns, in matrix order
pub const ORDINAL_COLUMNS: [&str; 1] = [JOB];

/// Standardized numeric columns, in matrix order
pub const NUMERIC_COLUMNS: [&str; 3] = [AGE, CREDIT_AMOUNT, DURATION];

/// Every column a record must carry a value for before it can be encoded
pub const FEATURE_COLUMNS: [&str; 9] = [
    AGE,
    SEX,
    JOB,
    HOUSING,
    SAVING_ACCOUNTS,
    CHECKING_ACCOUNT,
    CREDIT_AMOUNT,
    DURATION,
    PURPOSE,
];

/// Source-specific spellings and their canonical names (applied after lower-casing)
pub const COLUMN_SYNONYMS: [(&str, &str); 6] = [
    ("saving.accounts", SAVING_ACCOUNTS),
    ("checking.account", CHECKING_ACCOUNT),
    ("credit.amount", CREDIT_AMOUNT),
    ("saving_accounts", SAVING_ACCOUNTS),
    ("checking_account", CHECKING_ACCOUNT),
    ("credit_amount", CREDIT_AMOUNT),
];

/// Which source a record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Training,
    Counterfactual,
    User,
}

impl Provenance {
    pub const ALL: [Provenance; 3] = [
        Provenance::Training,
        Provenance::Counterfactual,
        Provenance::User,
    ];

    /// Integer tag stored in the provenance column
    pub fn code(self) -> i32 {
        match self {
            Provenance::Training => 0,
            Provenance::Counterfactual => 1,
            Provenance::User => 2,
        }
    }

    /// Label used in the `data_type` field of the export
    pub fn as_str(self) -> &'static str {
        match self {
            Provenance::Training => "training",
            Provenance::Counterfactual => "counterfactual",
            Provenance::User => "user",
        }
    }

    /// Decode a provenance tag read from row `row`.
    pub fn from_code(value: i64, row: usize) -> Result<Self, PipelineError> {
        match value {
            0 => Ok(Provenance::Training),
            1 => Ok(Provenance::Counterfactual),
            2 => Ok(Provenance::User),
            _ => Err(PipelineError::InvalidProvenance { row, value }),
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Provenance::Training => "Training",
            Provenance::Counterfactual => "Counterfactual",
            Provenance::User => "User",
        };
        write!(f, "{}", label)
    }
}
