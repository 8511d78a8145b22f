use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(Role {
    User => "user",
    Assistant => "assistant",
});

str_enum!(Intent {
    Chat => "CHAT",
    Query => "QUERY",
    Update => "UPDATE",
    BulkInsert => "BULK_INSERT",
});

str_enum!(EntityTable {
    Patients => "patients",
    Visits => "visits",
    Prescriptions => "prescriptions",
    Billing => "billing",
});

str_enum!(BillingStatus {
    Pending => "Pending",
    Paid => "Paid",
    Overdue => "Overdue",
});

str_enum!(WriteKind {
    Created => "created",
    Updated => "updated",
    Deleted => "deleted",
});

impl Intent {
    /// Lenient parse used on model output ("query", " Query ").
    pub fn parse_loose(raw: &str) -> Option<Self> {
        raw.trim().to_ascii_uppercase().parse().ok()
    }
}

impl EntityTable {
    /// Detection priority. When a statement names several tables, the one
    /// listed first here wins, whatever its position in the statement.
    pub const ALL: [EntityTable; 4] = [
        EntityTable::Patients,
        EntityTable::Visits,
        EntityTable::Prescriptions,
        EntityTable::Billing,
    ];

    /// First table in [`Self::ALL`] order whose name occurs anywhere in `text`
    /// (case-insensitive containment). `visits JOIN patients` yields `Patients`.
    pub fn detect_in(text: &str) -> Option<Self> {
        let lower = text.to_lowercase();
        Self::ALL.into_iter().find(|t| lower.contains(t.as_str()))
    }
}

impl BillingStatus {
    pub const ALL: [BillingStatus; 3] = [
        BillingStatus::Pending,
        BillingStatus::Paid,
        BillingStatus::Overdue,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intent_round_trips_through_str() {
        for intent in [Intent::Chat, Intent::Query, Intent::Update, Intent::BulkInsert] {
            assert_eq!(intent.as_str().parse::<Intent>().unwrap(), intent);
        }
    }

    #[test]
    fn intent_parse_loose_accepts_lowercase() {
        assert_eq!(Intent::parse_loose(" query "), Some(Intent::Query));
        assert_eq!(Intent::parse_loose("bulk_insert"), Some(Intent::BulkInsert));
        assert_eq!(Intent::parse_loose("DELETE"), None);
    }

    #[test]
    fn unknown_value_reports_enum_name() {
        let err = "SOMETHING".parse::<Intent>().unwrap_err();
        assert!(err.to_string().contains("Intent"));
    }

    #[test]
    fn intent_serializes_as_wire_name() {
        let json = serde_json::to_string(&Intent::BulkInsert).unwrap();
        assert_eq!(json, "\"BULK_INSERT\"");
        let back: Intent = serde_json::from_str("\"UPDATE\"").unwrap();
        assert_eq!(back, Intent::Update);
    }

    #[test]
    fn table_detection_follows_declared_order() {
        assert_eq!(
            EntityTable::detect_in("SELECT * FROM billing WHERE patient_id = 1"),
            Some(EntityTable::Billing)
        );
        assert_eq!(
            EntityTable::detect_in("SELECT v.* FROM visits v JOIN patients p ON v.patient_id = p.id"),
            Some(EntityTable::Patients)
        );
        assert_eq!(EntityTable::detect_in("SELECT 1"), None);
    }

    #[test]
    fn table_detection_is_case_insensitive() {
        assert_eq!(
            EntityTable::detect_in("INSERT INTO Prescriptions (visit_id) VALUES (1)"),
            Some(EntityTable::Prescriptions)
        );
    }
}
