//! Statement templates for the managed table.
//!
//! Every fixed statement the store issues is a [`Statement`] variant. Templates
//! are rendered once per store for its table name and [`Dialect`], then looked
//! up by variant; only search builds SQL at runtime (see
//! [`super::search`]).

/// SQL dialect spoken by a backend.
///
/// Dialects differ in placeholder syntax, how a write transaction is opened
/// and which function performs a case-sensitive substring test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// `SQLite`: `?N` placeholders.
    Sqlite,
    /// PostgreSQL: `$N` placeholders.
    Postgres,
}

impl Dialect {
    /// Renders the placeholder for the 1-based parameter `index`.
    #[must_use]
    pub fn placeholder(self, index: usize) -> String {
        match self {
            Self::Sqlite => format!("?{index}"),
            Self::Postgres => format!("${index}"),
        }
    }

    /// Statement that opens a write transaction.
    ///
    /// `SQLite` takes the write lock up front so that an existence check and
    /// the write that depends on it cannot interleave with another writer.
    #[must_use]
    pub const fn begin(self) -> &'static str {
        match self {
            Self::Sqlite => "BEGIN IMMEDIATE",
            Self::Postgres => "BEGIN",
        }
    }

    /// Case-sensitive "`column` contains `placeholder`" predicate.
    #[must_use]
    pub fn contains(self, column: Column, placeholder: &str) -> String {
        match self {
            Self::Sqlite => format!("instr({}, {placeholder}) > 0", column.as_str()),
            Self::Postgres => format!("strpos({}, {placeholder}) > 0", column.as_str()),
        }
    }
}

/// Columns of the managed table, in positional order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    /// Primary key.
    UserId,
    /// Email address.
    UserEmail,
    /// External subject association.
    SubjectId,
}

impl Column {
    /// All columns, in the order rows are mapped to records.
    pub const ALL: [Self; 3] = [Self::UserId, Self::UserEmail, Self::SubjectId];

    /// Returns the column name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UserId => "user_id",
            Self::UserEmail => "user_email",
            Self::SubjectId => "subject_id",
        }
    }
}

/// Select list shared by every statement that returns records.
pub const SELECT_COLUMNS: &str = "user_id, user_email, subject_id";

/// The fixed statements issued against the managed table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Statement {
    /// Creates the table if it does not exist, keyed on `user_id`.
    CreateTable,
    /// Point lookup by id. Params: `id`.
    Select,
    /// Full scan.
    SelectAll,
    /// Insert one row. Params: `id`, `email`, `subject_id`.
    Insert,
    /// Overwrite email and subject. Params: `email`, `subject_id`, `id`.
    Update,
    /// Delete by id. Params: `id`.
    Delete,
    /// Delete every row.
    DeleteAll,
    /// Row count.
    Count,
    /// Exact email match. Params: `email`.
    SelectByEmail,
    /// Existence probe by id; returns a row iff the id is present. Params: `id`.
    CheckExists,
}

impl Statement {
    /// Number of statements.
    pub const COUNT: usize = 10;

    /// Every statement, in declaration order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::CreateTable,
        Self::Select,
        Self::SelectAll,
        Self::Insert,
        Self::Update,
        Self::Delete,
        Self::DeleteAll,
        Self::Count,
        Self::SelectByEmail,
        Self::CheckExists,
    ];

    const fn index(self) -> usize {
        self as usize
    }

    /// Renders the statement for `table` in `dialect`.
    ///
    /// `table` must already be a validated identifier; it is interpolated
    /// as-is. All values are bound through placeholders.
    #[must_use]
    pub fn render(self, table: &str, dialect: Dialect) -> String {
        let p = |index| dialect.placeholder(index);
        match self {
            Self::CreateTable => format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    user_id BIGINT PRIMARY KEY NOT NULL,
                    user_email TEXT NOT NULL,
                    subject_id BIGINT NOT NULL
                )"
            ),
            Self::Select => {
                format!("SELECT {SELECT_COLUMNS} FROM {table} WHERE user_id = {}", p(1))
            },
            Self::SelectAll => format!("SELECT {SELECT_COLUMNS} FROM {table}"),
            Self::Insert => format!(
                "INSERT INTO {table} (user_id, user_email, subject_id) VALUES ({}, {}, {})",
                p(1),
                p(2),
                p(3)
            ),
            Self::Update => format!(
                "UPDATE {table} SET user_email = {}, subject_id = {} WHERE user_id = {}",
                p(1),
                p(2),
                p(3)
            ),
            Self::Delete => format!("DELETE FROM {table} WHERE user_id = {}", p(1)),
            Self::DeleteAll => format!("DELETE FROM {table}"),
            Self::Count => format!("SELECT COUNT(*) FROM {table}"),
            Self::SelectByEmail => format!(
                "SELECT {SELECT_COLUMNS} FROM {table} WHERE user_email = {}",
                p(1)
            ),
            Self::CheckExists => {
                format!("SELECT 1 FROM {table} WHERE user_id = {} LIMIT 1", p(1))
            },
        }
    }
}

/// Statements rendered for one table and dialect.
#[derive(Debug, Clone)]
pub struct StatementSet {
    rendered: [String; Statement::COUNT],
}

impl StatementSet {
    /// Renders every statement for `table` in `dialect`.
    #[must_use]
    pub fn new(table: &str, dialect: Dialect) -> Self {
        Self {
            rendered: Statement::ALL.map(|statement| statement.render(table, dialect)),
        }
    }

    /// Returns the SQL for `statement`.
    #[must_use]
    pub fn sql(&self, statement: Statement) -> &str {
        &self.rendered[statement.index()]
    }
}

/// Returns true if `name` can be used unquoted as a table name.
///
/// Accepts ASCII letters, digits and underscores, not starting with a digit,
/// at most 63 bytes (the PostgreSQL identifier limit).
#[must_use]
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    name.len() <= 63
        && (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
