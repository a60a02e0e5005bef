//! Semantic column roles and keyword-driven header resolution.
//!
//! Export headers differ between submissions ("Cod Procedimiento", "CUPS", "Code", ...),
//! so every stage looks columns up by [`SemanticRole`] instead of by literal label. A
//! [`KeywordTable`] lists the substrings that identify each role; [`resolve`] binds each
//! role to the left-most column whose label contains any of them.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticRole {
    ProfessionalName,
    ProcedureCode,
    ProcedureName,
    UnitValue,
    Quantity,
    TotalValue,
    Date,
    City,
    Site,
    PatientName,
    Other,
}

impl SemanticRole {
    pub const ALL: [SemanticRole; 11] = [
        SemanticRole::ProfessionalName,
        SemanticRole::ProcedureCode,
        SemanticRole::ProcedureName,
        SemanticRole::UnitValue,
        SemanticRole::Quantity,
        SemanticRole::TotalValue,
        SemanticRole::Date,
        SemanticRole::City,
        SemanticRole::Site,
        SemanticRole::PatientName,
        SemanticRole::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SemanticRole::ProfessionalName => "professional_name",
            SemanticRole::ProcedureCode => "procedure_code",
            SemanticRole::ProcedureName => "procedure_name",
            SemanticRole::UnitValue => "unit_value",
            SemanticRole::Quantity => "quantity",
            SemanticRole::TotalValue => "total_value",
            SemanticRole::Date => "date",
            SemanticRole::City => "city",
            SemanticRole::Site => "site",
            SemanticRole::PatientName => "patient_name",
            SemanticRole::Other => "other",
        }
    }
}

impl fmt::Display for SemanticRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered `(role, keywords)` pairs. Roles missing from the table never resolve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeywordTable(BTreeMap<SemanticRole, Vec<String>>);

impl KeywordTable {
    pub fn new<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (SemanticRole, Vec<K>)>,
        K: Into<String>,
    {
        KeywordTable(
            entries
                .into_iter()
                .map(|(role, keywords)| (role, keywords.into_iter().map(Into::into).collect()))
                .collect(),
        )
    }

    /// Keywords for the primary (billing) side of the price join and for export cleanup.
    pub fn join_defaults() -> Self {
        KeywordTable::new([
            (SemanticRole::ProfessionalName, vec!["profesional", "professional"]),
            (
                SemanticRole::ProcedureCode,
                vec![
                    "codigo procedimiento",
                    "cod procedimiento",
                    "codigo",
                    "cups",
                    "procedure code",
                    "code",
                ],
            ),
            (
                SemanticRole::ProcedureName,
                vec![
                    "nombre procedimiento",
                    "procedimiento",
                    "descripcion",
                    "nombre",
                    "procedure name",
                    "description",
                ],
            ),
            (
                SemanticRole::UnitValue,
                vec![
                    "valor unitario",
                    "valor_unitario",
                    "precio unitario",
                    "unit price",
                    "unit value",
                ],
            ),
            (SemanticRole::Quantity, vec!["cantidad", "cant", "quantity", "qty"]),
            (
                SemanticRole::TotalValue,
                vec!["valor total", "total", "valor neto", "neto", "net value"],
            ),
            (SemanticRole::Date, vec!["fecha", "date"]),
            (
                SemanticRole::City,
                vec!["ciudad", "municipio", "city", "municipality"],
            ),
            (SemanticRole::Site, vec!["sede", "site", "branch"]),
            (SemanticRole::PatientName, vec!["paciente", "patient"]),
        ])
    }

    /// The join table with a wider unit price vocabulary, for price catalogs that label
    /// their only amount column "Valor" or "Precio".
    pub fn reference_defaults() -> Self {
        Self::join_defaults().with_role(
            SemanticRole::UnitValue,
            vec![
                "valor unitario",
                "valor_unitario",
                "precio",
                "valor",
                "unit price",
                "price",
                "value",
            ],
        )
    }

    /// Narrow keywords used when filtering and summarizing the persisted dataset.
    pub fn query_defaults() -> Self {
        KeywordTable::new([
            (SemanticRole::ProfessionalName, vec!["profesional", "professional"]),
            (
                SemanticRole::ProcedureName,
                vec!["nombre procedimiento", "procedure name"],
            ),
            (
                SemanticRole::City,
                vec!["ciudad", "municipio", "city", "municipality"],
            ),
            (SemanticRole::Site, vec!["sede", "site", "branch"]),
            (SemanticRole::Date, vec!["fecha", "date"]),
            (SemanticRole::PatientName, vec!["paciente", "patient"]),
            (
                SemanticRole::TotalValue,
                vec!["valor total", "total", "valor neto", "neto", "net value"],
            ),
        ])
    }

    pub fn with_role<K: Into<String>>(mut self, role: SemanticRole, keywords: Vec<K>) -> Self {
        self.0
            .insert(role, keywords.into_iter().map(Into::into).collect());
        self
    }

    pub fn keywords(&self, role: SemanticRole) -> &[String] {
        self.0.get(&role).map(|k| k.as_slice()).unwrap_or(&[])
    }

    pub fn roles(&self) -> impl Iterator<Item = SemanticRole> + '_ {
        self.0.keys().copied()
    }
}

/// Role → column label bindings for one dataset.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct ResolvedSchema(BTreeMap<SemanticRole, String>);

impl ResolvedSchema {
    pub fn column(&self, role: SemanticRole) -> Option<&str> {
        self.0.get(&role).map(|s| s.as_str())
    }

    pub fn has(&self, role: SemanticRole) -> bool {
        self.0.contains_key(&role)
    }

    pub fn iter(&self) -> impl Iterator<Item = (SemanticRole, &str)> + '_ {
        self.0.iter().map(|(role, column)| (*role, column.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Finds the left-most header containing `keywords`, case-insensitively.
pub fn find_column<'a>(headers: &'a [String], keywords: &[String]) -> Option<&'a str> {
    if keywords.is_empty() {
        return None;
    }
    let lowered = keywords.iter().map(|k| k.to_lowercase()).collect::<Vec<_>>();
    headers
        .iter()
        .find(|header| {
            let header = header.to_lowercase();
            lowered.iter().any(|keyword| header.contains(keyword.as_str()))
        })
        .map(|h| h.as_str())
}

/// Binds every role of `table` independently; one column may serve several roles.
pub fn resolve(dataset: &Dataset, table: &KeywordTable) -> ResolvedSchema {
    let mut bindings = BTreeMap::new();
    for role in table.roles() {
        if let Some(column) = find_column(dataset.headers(), table.keywords(role)) {
            bindings.insert(role, column.to_string());
        }
    }
    ResolvedSchema(bindings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(labels: &[&str]) -> Dataset {
        Dataset::from_strings(labels, &[])
    }

    #[test]
    fn column_order_decides_not_keyword_order() {
        let table = KeywordTable::new([(SemanticRole::ProcedureCode, vec!["cups", "codigo"])]);
        let schema = resolve(&headers(&["Codigo Interno", "CUPS"]), &table);
        assert_eq!(schema.column(SemanticRole::ProcedureCode), Some("Codigo Interno"));
    }

    #[test]
    fn one_column_can_serve_two_roles() {
        let schema = resolve(
            &headers(&["Nombre Profesional", "Cantidad"]),
            &KeywordTable::join_defaults(),
        );
        assert_eq!(
            schema.column(SemanticRole::ProfessionalName),
            Some("Nombre Profesional")
        );
        assert_eq!(
            schema.column(SemanticRole::ProcedureName),
            Some("Nombre Profesional")
        );
    }

    #[test]
    fn unmatched_roles_stay_unresolved() {
        let schema = resolve(&headers(&["foo", "bar"]), &KeywordTable::join_defaults());
        assert!(schema.is_empty());
        assert!(!schema.has(SemanticRole::UnitValue));
    }

    #[test]
    fn reference_table_accepts_bare_price_column() {
        let data = headers(&["Codigo", "Valor"]);
        assert!(!resolve(&data, &KeywordTable::join_defaults()).has(SemanticRole::UnitValue));
        assert_eq!(
            resolve(&data, &KeywordTable::reference_defaults()).column(SemanticRole::UnitValue),
            Some("Valor")
        );
    }
}
