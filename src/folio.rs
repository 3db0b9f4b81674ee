//! Sequential document folios: `{TYPE}-{YYYYMMDD}-{SEQ:05}`.
//!
//! The sequence restarts at 1 each day per document type. Folios must be
//! generated inside the same transaction as the document insert; the unique
//! constraint on the folio column plus a bounded insert retry serializes
//! concurrent creation for the same (type, day) pair.

use chrono::NaiveDate;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder};
use strum::Display;

use crate::entities::{purchase, sale};
use crate::errors::ServiceError;

/// Document kinds that carry a folio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum DocumentType {
    Purchase,
    Sale,
}

/// Returns the next folio for `doc_type` on `today`.
///
/// Sequences are zero-padded to five digits, so the lexicographic maximum of
/// the day's folios is also the numeric maximum.
pub async fn next_folio<C: ConnectionTrait>(
    conn: &C,
    doc_type: DocumentType,
    today: NaiveDate,
) -> Result<String, ServiceError> {
    let prefix = format!("{}-{}", doc_type, today.format("%Y%m%d"));

    let last = match doc_type {
        DocumentType::Purchase => purchase::Entity::find()
            .filter(purchase::Column::Folio.starts_with(prefix.as_str()))
            .order_by_desc(purchase::Column::Folio)
            .one(conn)
            .await?
            .map(|m| m.folio),
        DocumentType::Sale => sale::Entity::find()
            .filter(sale::Column::Folio.starts_with(prefix.as_str()))
            .order_by_desc(sale::Column::Folio)
            .one(conn)
            .await?
            .map(|m| m.folio),
    };

    let seq = match last {
        Some(folio) => parse_sequence(&folio)? + 1,
        None => 1,
    };

    Ok(format!("{}-{:05}", prefix, seq))
}

fn parse_sequence(folio: &str) -> Result<u32, ServiceError> {
    folio
        .rsplit('-')
        .next()
        .and_then(|seq| seq.parse::<u32>().ok())
        .ok_or_else(|| {
            ServiceError::FolioGeneration(format!("persisted folio {folio:?} is malformed"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_sequence() {
        assert_eq!(parse_sequence("PURCHASE-20250101-00042").unwrap(), 42);
    }

    #[test]
    fn rejects_malformed_sequence() {
        assert!(matches!(
            parse_sequence("PURCHASE-20250101-XYZ"),
            Err(ServiceError::FolioGeneration(_))
        ));
    }

    #[test]
    fn document_type_prefixes() {
        assert_eq!(DocumentType::Purchase.to_string(), "PURCHASE");
        assert_eq!(DocumentType::Sale.to_string(), "SALE");
    }
}
