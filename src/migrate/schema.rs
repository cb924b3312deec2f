//! Table and column descriptions for migrations.
//!
//! ```
//! use quarry::migrate::Table;
//!
//! let mut users = Table::create("users");
//! users.column("id").int().auto_increment().primary().commit();
//! users.column("name").string(100).not_null().commit();
//! assert_eq!(users.columns_to_add.len(), 2);
//! ```

use std::fmt;

use crate::value::Value;

/// Column data types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    TinyInt,
    SmallInt,
    MediumInt,
    Int,
    BigInt,
    Decimal,
    Float,
    Double,
    Char,
    Varchar,
    TinyText,
    Text,
    MediumText,
    LongText,
    Date,
    DateTime,
    Timestamp,
    Time,
    Year,
    Boolean,
    Enum,
    Set,
}

impl ColumnType {
    /// MySQL spelling, also used for display.
    pub fn name(&self) -> &'static str {
        match self {
            ColumnType::TinyInt => "TINYINT",
            ColumnType::SmallInt => "SMALLINT",
            ColumnType::MediumInt => "MEDIUMINT",
            ColumnType::Int => "INT",
            ColumnType::BigInt => "BIGINT",
            ColumnType::Decimal => "DECIMAL",
            ColumnType::Float => "FLOAT",
            ColumnType::Double => "DOUBLE",
            ColumnType::Char => "CHAR",
            ColumnType::Varchar => "VARCHAR",
            ColumnType::TinyText => "TINYTEXT",
            ColumnType::Text => "TEXT",
            ColumnType::MediumText => "MEDIUMTEXT",
            ColumnType::LongText => "LONGTEXT",
            ColumnType::Date => "DATE",
            ColumnType::DateTime => "DATETIME",
            ColumnType::Timestamp => "TIMESTAMP",
            ColumnType::Time => "TIME",
            ColumnType::Year => "YEAR",
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::Enum => "ENUM",
            ColumnType::Set => "SET",
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            ColumnType::TinyInt
                | ColumnType::SmallInt
                | ColumnType::MediumInt
                | ColumnType::Int
                | ColumnType::BigInt
        )
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct References {
    pub table: String,
    pub column: String,
}

/// Column default. `Literal` values are quoted per engine; `Expression`
/// is emitted verbatim (`CURRENT_TIMESTAMP`, `uuid()`...).
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultValue {
    Literal(Value),
    Expression(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnConfig {
    pub auto_increment: bool,
    pub unsigned: bool,
    pub nullable: bool,
    pub unique: bool,
    pub primary: bool,
    pub references: Option<References>,
    pub default_value: Option<DefaultValue>,
    /// Default to the current timestamp on insert.
    pub auto_create: bool,
    /// Refresh to the current timestamp on update.
    pub auto_update: bool,
    pub cascade: bool,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            auto_increment: false,
            unsigned: false,
            nullable: true,
            unique: false,
            primary: false,
            references: None,
            default_value: None,
            auto_create: false,
            auto_update: false,
            cascade: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    /// Set when the column is being renamed from this name.
    pub old_name: Option<String>,
    pub column_type: ColumnType,
    /// Members of an ENUM or SET.
    pub values: Vec<String>,
    pub length: Option<u32>,
    /// Digits after the decimal point, DECIMAL only.
    pub scale: Option<u32>,
    /// Redefine an existing column instead of adding one.
    pub alter: bool,
    pub after: Option<String>,
    pub config: ColumnConfig,
}

impl Column {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            old_name: None,
            column_type,
            values: Vec::new(),
            length: None,
            scale: None,
            alter: false,
            after: None,
            config: ColumnConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DropColumn {
    pub name: String,
    /// Drop a foreign-key constraint of this name rather than a column.
    pub foreign_key: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationType {
    Create,
    Alter,
    RawQuery,
    Drop,
}

/// Everything one migration step does to one table.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub table_name: String,
    pub columns_to_add: Vec<Column>,
    pub columns_to_alter: Vec<Column>,
    pub columns_to_delete: Vec<DropColumn>,
    pub drop_table: bool,
    pub truncate_table: bool,
    pub migration_type: MigrationType,
    pub raw_query: Option<String>,
}

impl Table {
    pub fn new(table_name: impl Into<String>, migration_type: MigrationType) -> Self {
        Self {
            table_name: table_name.into(),
            columns_to_add: Vec::new(),
            columns_to_alter: Vec::new(),
            columns_to_delete: Vec::new(),
            drop_table: false,
            truncate_table: false,
            migration_type,
            raw_query: None,
        }
    }

    pub fn create(table_name: impl Into<String>) -> Self {
        Self::new(table_name, MigrationType::Create)
    }

    pub fn alter(table_name: impl Into<String>) -> Self {
        Self::new(table_name, MigrationType::Alter)
    }

    /// A drop-type migration; pair with [`Table::drop`], [`Table::truncate`]
    /// or [`Table::drop_column`].
    pub fn dropping(table_name: impl Into<String>) -> Self {
        Self::new(table_name, MigrationType::Drop)
    }

    /// A migration that runs `sql` verbatim.
    pub fn raw(table_name: impl Into<String>, sql: impl Into<String>) -> Self {
        let mut table = Self::new(table_name, MigrationType::RawQuery);
        table.raw_query = Some(sql.into());
        table
    }

    /// Start a column definition. Nothing is recorded until `commit()`.
    pub fn column(&mut self, name: impl Into<String>) -> ColumnTypeBuilder<'_> {
        ColumnTypeBuilder {
            table: self,
            name: name.into(),
        }
    }

    /// Record a finished column in the list matching the migration type.
    pub fn push_column(&mut self, column: Column) {
        match self.migration_type {
            MigrationType::Alter => self.columns_to_alter.push(column),
            _ => self.columns_to_add.push(column),
        }
    }

    pub fn drop_column(&mut self, name: impl Into<String>) -> &mut Self {
        self.columns_to_delete.push(DropColumn {
            name: name.into(),
            foreign_key: false,
        });
        self
    }

    pub fn drop_foreign_key(&mut self, name: impl Into<String>) -> &mut Self {
        self.columns_to_delete.push(DropColumn {
            name: name.into(),
            foreign_key: true,
        });
        self
    }

    pub fn drop(mut self) -> Self {
        self.drop_table = true;
        self
    }

    pub fn truncate(mut self) -> Self {
        self.truncate_table = true;
        self
    }
}

/// Picks the column type. Every method hands back a [`ColumnBuilder`].
#[must_use = "columns are only recorded by ColumnBuilder::commit"]
pub struct ColumnTypeBuilder<'t> {
    table: &'t mut Table,
    name: String,
}

impl<'t> ColumnTypeBuilder<'t> {
    pub fn of_type(self, column_type: ColumnType) -> ColumnBuilder<'t> {
        ColumnBuilder {
            table: self.table,
            column: Column::new(self.name, column_type),
        }
    }

    fn sized(self, column_type: ColumnType, length: u32) -> ColumnBuilder<'t> {
        let mut builder = self.of_type(column_type);
        builder.column.length = Some(length);
        builder
    }

    fn listed<I, S>(self, column_type: ColumnType, values: I) -> ColumnBuilder<'t>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut builder = self.of_type(column_type);
        builder.column.values = values.into_iter().map(Into::into).collect();
        builder
    }

    /// VARCHAR(length)
    pub fn string(self, length: u32) -> ColumnBuilder<'t> {
        self.sized(ColumnType::Varchar, length)
    }

    pub fn char(self, length: u32) -> ColumnBuilder<'t> {
        self.sized(ColumnType::Char, length)
    }

    pub fn tiny_text(self) -> ColumnBuilder<'t> {
        self.of_type(ColumnType::TinyText)
    }

    pub fn text(self) -> ColumnBuilder<'t> {
        self.of_type(ColumnType::Text)
    }

    pub fn medium_text(self) -> ColumnBuilder<'t> {
        self.of_type(ColumnType::MediumText)
    }

    pub fn long_text(self) -> ColumnBuilder<'t> {
        self.of_type(ColumnType::LongText)
    }

    pub fn tiny_int(self) -> ColumnBuilder<'t> {
        self.of_type(ColumnType::TinyInt)
    }

    pub fn small_int(self) -> ColumnBuilder<'t> {
        self.of_type(ColumnType::SmallInt)
    }

    pub fn medium_int(self) -> ColumnBuilder<'t> {
        self.of_type(ColumnType::MediumInt)
    }

    pub fn int(self) -> ColumnBuilder<'t> {
        self.of_type(ColumnType::Int)
    }

    pub fn big_int(self) -> ColumnBuilder<'t> {
        self.of_type(ColumnType::BigInt)
    }

    pub fn decimal(self, precision: u32, scale: u32) -> ColumnBuilder<'t> {
        let mut builder = self.sized(ColumnType::Decimal, precision);
        builder.column.scale = Some(scale);
        builder
    }

    pub fn float(self) -> ColumnBuilder<'t> {
        self.of_type(ColumnType::Float)
    }

    pub fn double(self) -> ColumnBuilder<'t> {
        self.of_type(ColumnType::Double)
    }

    pub fn boolean(self) -> ColumnBuilder<'t> {
        self.of_type(ColumnType::Boolean)
    }

    pub fn date(self) -> ColumnBuilder<'t> {
        self.of_type(ColumnType::Date)
    }

    pub fn date_time(self) -> ColumnBuilder<'t> {
        self.of_type(ColumnType::DateTime)
    }

    pub fn timestamp(self) -> ColumnBuilder<'t> {
        self.of_type(ColumnType::Timestamp)
    }

    pub fn time(self) -> ColumnBuilder<'t> {
        self.of_type(ColumnType::Time)
    }

    pub fn year(self) -> ColumnBuilder<'t> {
        self.of_type(ColumnType::Year)
    }

    pub fn enumeration<I, S>(self, values: I) -> ColumnBuilder<'t>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.listed(ColumnType::Enum, values)
    }

    pub fn set<I, S>(self, values: I) -> ColumnBuilder<'t>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.listed(ColumnType::Set, values)
    }
}

/// Configures one column. Each step consumes and returns the builder;
/// [`ColumnBuilder::commit`] records the column on its table.
#[must_use = "columns are only recorded by ColumnBuilder::commit"]
pub struct ColumnBuilder<'t> {
    table: &'t mut Table,
    column: Column,
}

impl<'t> ColumnBuilder<'t> {
    pub fn length(mut self, length: u32) -> Self {
        self.column.length = Some(length);
        self
    }

    pub fn nullable(mut self) -> Self {
        self.column.config.nullable = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.column.config.nullable = false;
        self
    }

    pub fn unique(mut self) -> Self {
        self.column.config.unique = true;
        self
    }

    pub fn primary(mut self) -> Self {
        self.column.config.primary = true;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.column.config.auto_increment = true;
        self
    }

    pub fn unsigned(mut self) -> Self {
        self.column.config.unsigned = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.column.config.default_value = Some(DefaultValue::Literal(value.into()));
        self
    }

    pub fn default_expression(mut self, expression: impl Into<String>) -> Self {
        self.column.config.default_value = Some(DefaultValue::Expression(expression.into()));
        self
    }

    pub fn auto_create(mut self) -> Self {
        self.column.config.auto_create = true;
        self
    }

    pub fn auto_update(mut self) -> Self {
        self.column.config.auto_update = true;
        self
    }

    pub fn references(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.column.config.references = Some(References {
            table: table.into(),
            column: column.into(),
        });
        self
    }

    /// ON DELETE CASCADE for the foreign key.
    pub fn cascade(mut self) -> Self {
        self.column.config.cascade = true;
        self
    }

    pub fn after(mut self, column: impl Into<String>) -> Self {
        self.column.after = Some(column.into());
        self
    }

    /// Redefine the existing column (MODIFY).
    pub fn alter(mut self) -> Self {
        self.column.alter = true;
        self
    }

    /// Rename from `old_name` to this builder's column name.
    pub fn rename_from(mut self, old_name: impl Into<String>) -> Self {
        self.column.old_name = Some(old_name.into());
        self
    }

    pub fn commit(self) {
        self.table.push_column(self.column);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nullable_defaults_true() {
        let column = Column::new("note", ColumnType::Text);
        assert!(column.config.nullable);
        assert_eq!(column.config.default_value, None);
    }

    #[test]
    fn test_commit_targets_list_by_migration_type() {
        let mut create = Table::create("users");
        create.column("id").int().primary().commit();
        assert_eq!(create.columns_to_add.len(), 1);
        assert!(create.columns_to_alter.is_empty());

        let mut alter = Table::alter("users");
        alter.column("email").string(255).unique().commit();
        assert!(alter.columns_to_add.is_empty());
        assert_eq!(alter.columns_to_alter[0].length, Some(255));
    }

    #[test]
    fn test_falsy_default_is_kept() {
        let mut t = Table::create("flags");
        t.column("enabled").boolean().default_value(false).commit();
        assert_eq!(
            t.columns_to_add[0].config.default_value,
            Some(DefaultValue::Literal(Value::Bool(false)))
        );
    }

    #[test]
    fn test_drop_entries() {
        let mut t = Table::alter("posts");
        t.drop_column("legacy").drop_foreign_key("posts_author_fk");
        assert_eq!(t.columns_to_delete.len(), 2);
        assert!(t.columns_to_delete[1].foreign_key);

        let t = Table::dropping("posts").truncate();
        assert!(t.truncate_table && !t.drop_table);
    }
}
