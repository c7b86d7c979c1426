//! SphinxQL statement builders.
//!
//! Fluent construction of the statement shapes search daemons accept:
//! fulltext SELECT with attribute filters, multi-document INSERT/REPLACE,
//! attribute UPDATE and DELETE by document id. All values render through
//! the escaping layer in [`crate::types`].

use sphinxql_core::Value;

use crate::types::{escape_str, format_value};

/// Sort direction for `ORDER BY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

impl Order {
    fn keyword(self) -> &'static str {
        match self {
            Order::Asc => "ASC",
            Order::Desc => "DESC",
        }
    }
}

/// A fulltext SELECT builder.
///
/// ```
/// use sphinxql_client::{Order, SearchQuery};
///
/// let sql = SearchQuery::index("articles")
///     .matching("rust driver")
///     .filter("category_id", 3i64)
///     .order_by("relevance", Order::Desc)
///     .limit(20)
///     .build();
/// assert_eq!(
///     sql,
///     "SELECT *, WEIGHT() AS relevance FROM articles \
///      WHERE MATCH('rust driver') AND category_id = 3 \
///      ORDER BY relevance DESC LIMIT 0, 20"
/// );
/// ```
#[derive(Debug, Clone)]
pub struct SearchQuery {
    index: String,
    columns: Vec<String>,
    matching: Option<String>,
    conditions: Vec<String>,
    group_by: Option<String>,
    order_by: Vec<(String, Order)>,
    limit: Option<u64>,
    offset: u64,
    options: Vec<(String, String)>,
}

impl SearchQuery {
    /// Start a SELECT against `index`.
    pub fn index(index: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            columns: Vec::new(),
            matching: None,
            conditions: Vec::new(),
            group_by: None,
            order_by: Vec::new(),
            limit: None,
            offset: 0,
            options: Vec::new(),
        }
    }

    /// Select specific columns instead of `*`.
    pub fn columns(mut self, cols: &[&str]) -> Self {
        self.columns = cols.iter().map(|&s| s.to_string()).collect();
        self
    }

    /// Add the fulltext `MATCH(...)` clause.
    pub fn matching(mut self, query: &str) -> Self {
        self.matching = Some(query.to_string());
        self
    }

    /// Add an attribute equality filter.
    pub fn filter(mut self, attr: &str, value: impl Into<Value>) -> Self {
        self.conditions
            .push(format!("{} = {}", attr, format_value(&value.into())));
        self
    }

    /// Add an attribute set-membership filter.
    pub fn filter_in<V: Into<Value>>(mut self, attr: &str, values: impl IntoIterator<Item = V>) -> Self {
        let rendered: Vec<String> = values
            .into_iter()
            .map(|v| format_value(&v.into()))
            .collect();
        self.conditions
            .push(format!("{} IN ({})", attr, rendered.join(", ")));
        self
    }

    /// Add a raw WHERE fragment.
    pub fn condition(mut self, raw: impl Into<String>) -> Self {
        self.conditions.push(raw.into());
        self
    }

    /// Add a GROUP BY column.
    pub fn group_by(mut self, col: &str) -> Self {
        self.group_by = Some(col.to_string());
        self
    }

    /// Add an ORDER BY clause.
    pub fn order_by(mut self, col: &str, order: Order) -> Self {
        self.order_by.push((col.to_string(), order));
        self
    }

    /// Set the page size; rendered as `LIMIT offset, limit`.
    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    /// Set the page offset. Only rendered together with a limit.
    pub fn offset(mut self, n: u64) -> Self {
        self.offset = n;
        self
    }

    /// Add an `OPTION key = value` pair.
    pub fn option(mut self, key: &str, value: &str) -> Self {
        self.options.push((key.to_string(), value.to_string()));
        self
    }

    /// Render the SELECT statement.
    pub fn build(&self) -> String {
        let mut fields: Vec<String> = if self.columns.is_empty() {
            vec!["*".to_string()]
        } else {
            self.columns.clone()
        };
        // Ordering by relevance implies selecting the ranker weight under
        // that name, unless the caller already did.
        if self.orders_by_relevance() && !fields.iter().any(|f| f.contains("relevance")) {
            fields.push("WEIGHT() AS relevance".to_string());
        }

        let mut sql = format!("SELECT {} FROM {}", fields.join(", "), self.index);

        let mut conditions = Vec::with_capacity(1 + self.conditions.len());
        if let Some(q) = &self.matching {
            conditions.push(format!("MATCH({})", escape_str(q)));
        }
        conditions.extend(self.conditions.iter().cloned());
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }

        if let Some(group) = &self.group_by {
            sql.push_str(" GROUP BY ");
            sql.push_str(group);
        }

        if !self.order_by.is_empty() {
            let rendered: Vec<String> = self
                .order_by
                .iter()
                .map(|(col, order)| format!("{} {}", col, order.keyword()))
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&rendered.join(", "));
        }

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}, {}", self.offset, limit));
        }

        if !self.options.is_empty() {
            let rendered: Vec<String> = self
                .options
                .iter()
                .map(|(k, v)| format!("{k} = {v}"))
                .collect();
            sql.push_str(" OPTION ");
            sql.push_str(&rendered.join(", "));
        }

        sql
    }

    fn orders_by_relevance(&self) -> bool {
        self.order_by.iter().any(|(col, _)| col == "relevance")
    }
}

/// An INSERT/REPLACE builder for one or more documents.
#[derive(Debug, Clone)]
pub struct InsertQuery {
    index: String,
    verb: &'static str,
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl InsertQuery {
    /// Start an `INSERT INTO index`.
    pub fn insert_into(index: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            verb: "INSERT",
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// Start a `REPLACE INTO index`.
    pub fn replace_into(index: impl Into<String>) -> Self {
        Self {
            verb: "REPLACE",
            ..Self::insert_into(index)
        }
    }

    /// Add one document. The first document fixes the column list; later
    /// documents must carry the same attributes in the same order.
    pub fn document(mut self, id: i64, attrs: &[(&str, Value)]) -> Self {
        if self.columns.is_empty() {
            self.columns.push("id".to_string());
            self.columns
                .extend(attrs.iter().map(|(name, _)| (*name).to_string()));
        }
        let mut row = Vec::with_capacity(1 + attrs.len());
        row.push(Value::Int(id));
        row.extend(attrs.iter().map(|(_, v)| v.clone()));
        self.rows.push(row);
        self
    }

    /// Render the statement.
    pub fn build(&self) -> String {
        let tuples: Vec<String> = self
            .rows
            .iter()
            .map(|row| {
                let rendered: Vec<String> = row.iter().map(format_value).collect();
                format!("({})", rendered.join(", "))
            })
            .collect();

        format!(
            "{} INTO {} ({}) VALUES {}",
            self.verb,
            self.index,
            self.columns.join(", "),
            tuples.join(", ")
        )
    }
}

/// An attribute UPDATE builder.
#[derive(Debug, Clone)]
pub struct UpdateQuery {
    index: String,
    sets: Vec<(String, Value)>,
    ids: Vec<i64>,
}

impl UpdateQuery {
    /// Start an `UPDATE index`.
    pub fn update(index: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            sets: Vec::new(),
            ids: Vec::new(),
        }
    }

    /// Set one attribute.
    pub fn set(mut self, attr: &str, value: impl Into<Value>) -> Self {
        self.sets.push((attr.to_string(), value.into()));
        self
    }

    /// Target one document id. May be called repeatedly for an id set.
    pub fn id(mut self, id: i64) -> Self {
        self.ids.push(id);
        self
    }

    /// Render the statement.
    pub fn build(&self) -> String {
        let sets: Vec<String> = self
            .sets
            .iter()
            .map(|(attr, value)| format!("{} = {}", attr, format_value(value)))
            .collect();

        format!(
            "UPDATE {} SET {} WHERE {}",
            self.index,
            sets.join(", "),
            id_clause(&self.ids)
        )
    }
}

/// Render a `DELETE FROM index` for one or more document ids.
pub fn delete_from(index: &str, ids: &[i64]) -> String {
    format!("DELETE FROM {} WHERE {}", index, id_clause(ids))
}

fn id_clause(ids: &[i64]) -> String {
    match ids {
        [id] => format!("id = {id}"),
        many => {
            let rendered: Vec<String> = many.iter().map(i64::to_string).collect();
            format!("id IN ({})", rendered.join(", "))
        }
    }
}
