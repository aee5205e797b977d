use std::borrow::Cow;
use deadpool_postgres::Client;
use tokio_postgres::Row;
use tokio_postgres::types::ToSql;

use crate::error::{AppError, Result};

/// One segment of a composed query: trusted syntax, or a bound parameter slot.
enum Piece {
    Lit(Cow<'static, str>),
    Slot(usize),
}

/// A parameterized SQL statement that keeps syntax and values in separate
/// channels.
///
/// Literal fragments only enter through [`Sql::lit`] and [`Sql::push`] (which
/// demand `&'static str`, i.e. source-controlled text) or through
/// [`Sql::ident`], which admits a runtime string only after validating it as a
/// bare identifier. Everything else is bound as a parameter and rendered as a
/// `$n` placeholder, so no value derived from external input can ever become
/// query syntax, whatever characters it contains.
///
/// Composition via [`Sql::append`] is associative and renumbers the right-hand
/// side's slots; two safe fragments always join into a safe statement.
pub struct Sql {
    pieces: Vec<Piece>,
    params: Vec<Box<dyn ToSql + Send + Sync>>,
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

impl Sql {
    /// Starts a statement from a trusted literal fragment.
    pub fn lit(text: &'static str) -> Self {
        Self {
            pieces: vec![Piece::Lit(Cow::Borrowed(text))],
            params: Vec::new(),
        }
    }

    /// Promotes a runtime string to trusted syntax, if and only if it is a
    /// bare identifier (word characters only). Anything else is rejected,
    /// never interpolated.
    pub fn ident(name: &str) -> Result<Self> {
        if !is_identifier(name) {
            return Err(AppError::Validation(format!(
                "'{}' is not a bare SQL identifier",
                name
            )));
        }
        Ok(Self {
            pieces: vec![Piece::Lit(Cow::Owned(name.to_string()))],
            params: Vec::new(),
        })
    }

    /// Appends a trusted literal fragment.
    pub fn push(mut self, text: &'static str) -> Self {
        self.pieces.push(Piece::Lit(Cow::Borrowed(text)));
        self
    }

    /// Binds a value as a parameter, rendered as a placeholder.
    pub fn bind<V>(mut self, value: V) -> Self
    where
        V: ToSql + Send + Sync + 'static,
    {
        self.params.push(Box::new(value));
        self.pieces.push(Piece::Slot(self.params.len() - 1));
        self
    }

    /// Binds each value as its own parameter, comma-separated — the shape an
    /// `IN ( ... )` list wants. Callers must not pass an empty list.
    pub fn bind_list<V>(mut self, values: Vec<V>) -> Self
    where
        V: ToSql + Send + Sync + 'static,
    {
        for (i, value) in values.into_iter().enumerate() {
            if i > 0 {
                self.pieces.push(Piece::Lit(Cow::Borrowed(", ")));
            }
            self.params.push(Box::new(value));
            self.pieces.push(Piece::Slot(self.params.len() - 1));
        }
        self
    }

    /// Joins another already-safe fragment onto this one, renumbering its
    /// parameter slots. Never splices rendered text.
    pub fn append(mut self, other: Sql) -> Self {
        let shift = self.params.len();
        for piece in other.pieces {
            self.pieces.push(match piece {
                Piece::Lit(text) => Piece::Lit(text),
                Piece::Slot(i) => Piece::Slot(i + shift),
            });
        }
        self.params.extend(other.params);
        self
    }

    /// Renders the statement text with positional placeholders.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for piece in &self.pieces {
            match piece {
                Piece::Lit(text) => out.push_str(text),
                Piece::Slot(i) => {
                    out.push('$');
                    out.push_str(&(i + 1).to_string());
                }
            }
        }
        out
    }

    /// Whether any parameters are bound.
    pub fn has_params(&self) -> bool {
        !self.params.is_empty()
    }

    fn param_refs(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.params
            .iter()
            .map(|p| -> &(dyn ToSql + Sync) { p.as_ref() })
            .collect()
    }

    /// Runs the statement and returns all rows.
    pub async fn query(&self, client: &Client) -> Result<Vec<Row>> {
        client
            .query(self.text().as_str(), &self.param_refs())
            .await
            .map_err(AppError::from)
    }

    /// Runs the statement and returns the affected row count.
    pub async fn execute(&self, client: &Client) -> Result<u64> {
        client
            .execute(self.text().as_str(), &self.param_refs())
            .await
            .map_err(AppError::from)
    }

    /// Runs a parameter-free, possibly multi-statement script.
    pub async fn batch(&self, client: &Client) -> Result<()> {
        if self.has_params() {
            return Err(AppError::Internal(
                "batch execution cannot bind parameters".to_string(),
            ));
        }
        client
            .batch_execute(self.text().as_str())
            .await
            .map_err(AppError::from)
    }
}
