//! Helpers for building the dynamic portions of list queries.

use std::{fmt::Write, str::FromStr};

use thiserror::Error;

pub type QueryAs<'q, T> = sqlx::query::QueryAs<
    'q,
    sqlx::Postgres,
    T,
    <sqlx::Postgres as sqlx::database::HasArguments<'q>>::Arguments,
>;

#[derive(Debug, Error)]
pub enum OrderByError {
    #[error("Invalid order_by field")]
    InvalidField,
    #[error("Invalid order_by direction for this field")]
    InvalidDirection,
}

/// Parse an `order_by` query value into a model's order-by field. A leading `-` selects
/// descending order.
pub fn parse_order_by<T>(field: &str) -> Result<(bool, T), OrderByError>
where
    T: FromStr<Err = OrderByError>,
{
    let descending = field.starts_with('-');
    let field = if descending { &field[1..] } else { field };

    let value = T::from_str(field)?;
    Ok((descending, value))
}

#[derive(Debug, Clone, Copy)]
pub enum BindingOperator {
    Eq,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl BindingOperator {
    fn as_str(&self) -> &'static str {
        match self {
            BindingOperator::Eq => "=",
            BindingOperator::Lt => "<",
            BindingOperator::Lte => "<=",
            BindingOperator::Gt => ">",
            BindingOperator::Gte => ">=",
        }
    }
}

/// Accumulates `AND <field> <op> $<n>` clauses, tracking placeholder indexes so that the
/// caller can bind values in the same order it added them.
pub struct FilterBuilder {
    clauses: String,
    next_binding: usize,
}

impl FilterBuilder {
    /// `first_binding` is the placeholder index of the first filter value. Fixed bindings
    /// (limit, offset) come before the filters, so this is usually 3.
    pub fn new(first_binding: usize) -> Self {
        Self {
            clauses: String::new(),
            next_binding: first_binding,
        }
    }

    /// Add a `field = ANY($n)` clause. Does nothing when `values` is empty, matching the
    /// bind step which skips empty vectors.
    pub fn add_vec<T>(&mut self, field: &str, values: &[T]) {
        if values.is_empty() {
            return;
        }

        write!(self.clauses, " AND {} = ANY(${})", field, self.next_binding).unwrap();
        self.next_binding += 1;
    }

    /// Add a `field <op> $n` clause when the value is present.
    pub fn add_option<T>(&mut self, field: &str, value: &Option<T>, operator: BindingOperator) {
        if value.is_none() {
            return;
        }

        write!(
            self.clauses,
            " AND {} {} ${}",
            field,
            operator.as_str(),
            self.next_binding
        )
        .unwrap();
        self.next_binding += 1;
    }
}

impl std::fmt::Display for FilterBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.clauses)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn empty_builder_renders_nothing() {
        let bindings = FilterBuilder::new(3);
        assert_eq!(bindings.to_string(), "");
    }

    #[test]
    fn skips_absent_values() {
        let mut bindings = FilterBuilder::new(3);
        bindings.add_vec::<i32>("id", &[]);
        bindings.add_option::<i32>("created_at", &None, BindingOperator::Lte);
        assert_eq!(bindings.to_string(), "");
    }

    #[derive(Debug, PartialEq)]
    enum Field {
        Name,
        CreatedAt,
    }

    impl FromStr for Field {
        type Err = OrderByError;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            match s {
                "name" => Ok(Field::Name),
                "created_at" => Ok(Field::CreatedAt),
                _ => Err(OrderByError::InvalidField),
            }
        }
    }

    #[test]
    fn order_by_directions() {
        assert_eq!(parse_order_by::<Field>("name").unwrap(), (false, Field::Name));
        assert_eq!(
            parse_order_by::<Field>("-created_at").unwrap(),
            (true, Field::CreatedAt)
        );
        assert!(parse_order_by::<Field>("nope").is_err());
    }

    #[test]
    fn numbers_clauses_in_order() {
        let mut bindings = FilterBuilder::new(3);
        bindings.add_vec("id", &[1, 2]);
        bindings.add_option("updated_at", &Some(5), BindingOperator::Gte);
        bindings.add_option("created_at", &Some(9), BindingOperator::Lt);
        assert_eq!(
            bindings.to_string(),
            " AND id = ANY($3) AND updated_at >= $4 AND created_at < $5"
        );
    }
}
