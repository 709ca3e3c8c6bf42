use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq { column: String, value: Value },
    In { column: String, values: Vec<Value> },
    Gte { column: String, value: Value },
}

/// How many rows a query expects back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cardinality {
    #[default]
    Many,
    /// Exactly one row; zero rows is a not-found error.
    Single,
    /// Zero or one row.
    MaybeSingle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ordering {
    pub column: String,
    pub direction: Direction,
}

/// A many-to-one relation pulled into each row under `alias`.
///
/// `foreign_key` names the column on the parent row that references the
/// embedded table's `id`. `hint` pins the constraint when the parent has more
/// than one foreign key into the same table.
#[derive(Debug, Clone, PartialEq)]
pub struct Embed {
    pub alias: String,
    pub table: String,
    pub foreign_key: String,
    pub hint: Option<String>,
    pub columns: Vec<String>,
    pub embeds: Vec<Embed>,
}

impl Embed {
    pub fn new(table: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        let table = table.into();
        Self {
            alias: table.clone(),
            table,
            foreign_key: foreign_key.into(),
            hint: None,
            columns: Vec::new(),
            embeds: Vec::new(),
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = alias.into();
        self
    }

    pub fn hint(mut self, constraint: impl Into<String>) -> Self {
        self.hint = Some(constraint.into());
        self
    }

    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn embed(mut self, embed: Embed) -> Self {
        self.embeds.push(embed);
        self
    }

    fn render(&self) -> String {
        let mut head = String::new();
        if self.alias != self.table {
            head.push_str(&self.alias);
            head.push(':');
        }
        head.push_str(&self.table);
        if let Some(hint) = &self.hint {
            head.push('!');
            head.push_str(hint);
        }
        format!("{head}({})", render_projection(&self.columns, &self.embeds))
    }
}

/// A read against one table: projection, joins, filters, order and limit.
#[derive(Debug, Clone, PartialEq)]
pub struct TableQuery {
    pub table: String,
    pub columns: Vec<String>,
    pub embeds: Vec<Embed>,
    pub filters: Vec<Filter>,
    pub order: Option<Ordering>,
    pub limit: Option<usize>,
    pub cardinality: Cardinality,
}

impl TableQuery {
    pub fn from(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            embeds: Vec::new(),
            filters: Vec::new(),
            order: None,
            limit: None,
            cardinality: Cardinality::Many,
        }
    }

    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn embed(mut self, embed: Embed) -> Self {
        self.embeds.push(embed);
        self
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq { column: column.into(), value: value.into() });
        self
    }

    pub fn in_list<I, V>(mut self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.filters.push(Filter::In {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn gte(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Gte { column: column.into(), value: value.into() });
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.order = Some(Ordering { column: column.into(), direction });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn single(mut self) -> Self {
        self.cardinality = Cardinality::Single;
        self
    }

    pub fn maybe_single(mut self) -> Self {
        self.cardinality = Cardinality::MaybeSingle;
        self
    }

    /// The `select=` clause, e.g. `id,title,cook:cooks(location_address)`.
    pub fn select_clause(&self) -> String {
        render_projection(&self.columns, &self.embeds)
    }

    /// Query-string pairs in the remote store's REST dialect.
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![("select".to_string(), self.select_clause())];

        for filter in &self.filters {
            let pair = match filter {
                Filter::Eq { column, value } => (column.clone(), format!("eq.{}", render_value(value))),
                Filter::Gte { column, value } => (column.clone(), format!("gte.{}", render_value(value))),
                Filter::In { column, values } => {
                    let list = values
                        .iter()
                        .map(|v| match v {
                            Value::String(s) => format!("\"{}\"", s.replace('"', "\\\"")),
                            other => render_value(other),
                        })
                        .collect::<Vec<_>>()
                        .join(",");
                    (column.clone(), format!("in.({list})"))
                }
            };
            pairs.push(pair);
        }

        if let Some(order) = &self.order {
            let direction = match order.direction {
                Direction::Asc => "asc",
                Direction::Desc => "desc",
            };
            pairs.push(("order".to_string(), format!("{}.{direction}", order.column)));
        }

        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }

        pairs
    }
}

fn render_projection(columns: &[String], embeds: &[Embed]) -> String {
    let mut parts: Vec<String> = if columns.is_empty() {
        vec!["*".to_string()]
    } else {
        columns.to_vec()
    };
    parts.extend(embeds.iter().map(Embed::render));
    parts.join(",")
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}
