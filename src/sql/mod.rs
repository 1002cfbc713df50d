//! SQL generation module.
//!
//! - [`condition`] - condition trees to `$n`-parameterized fragments
//! - [`assemble`] - full report statements from templates
//! - [`query`] - SELECT query builder
//! - [`token`] - Token types for SQL generation
//! - [`parse`] - sqlparser round-trip checks

pub mod assemble;
pub mod condition;
pub mod parse;
pub mod query;
pub mod token;

pub use assemble::{
    assemble, AppliedPage, AssembleOptions, AssembledQuery, Pagination, QueryRequest,
    DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, PAGE_ROW_COLUMN, TOTAL_COUNT_COLUMN,
};
pub use condition::{compile_conditions, Fragment};
pub use parse::{parse_single_query, validate_sql};
pub use query::{
    col, qualified_col, raw, ColumnExpr, Cte, Join, JoinType, LimitOffset, OrderByExpr, Query,
    SelectExpr, SortDir, TableRef,
};
pub use token::{Token, TokenStream};
