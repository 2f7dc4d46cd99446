//! SQL text per relational engine.
//!
//! The table name is interpolated with `format!`; it has already been checked
//! to be a plain identifier by `AdapterSpec::resolve`. Every value travels as
//! a bind parameter.
use super::schema::VALUE_COLUMNS;
use crate::Driver;

const COLUMN_LIST: &str = "ptype, v0, v1, v2, v3, v4, v5";

/// `ptype` and the value columns, each `VARCHAR(width)` defaulting to `''`.
fn value_columns(width: usize) -> String {
    std::iter::once("ptype")
        .chain(VALUE_COLUMNS)
        .map(|column| format!("{column} VARCHAR({width}) NOT NULL DEFAULT ''"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone)]
pub(crate) struct Statements {
    driver: Driver,
    table: String,
}

impl Statements {
    pub(crate) fn new(driver: Driver, table: &str) -> Self {
        Self {
            driver,
            table: table.to_string(),
        }
    }

    fn placeholder(&self, n: usize) -> String {
        match self.driver {
            Driver::Postgres => format!("${n}"),
            Driver::MySql | Driver::Sqlite => "?".to_string(),
        }
    }

    /// `(p1, ..., p7)` starting at parameter `first`.
    fn row_placeholders(&self, first: usize) -> String {
        let params: Vec<String> = (first..first + 7).map(|n| self.placeholder(n)).collect();
        format!("({})", params.join(", "))
    }

    pub(crate) fn create_table(&self) -> Vec<String> {
        let table = &self.table;
        let columns = value_columns(self.driver.value_width());
        match self.driver {
            Driver::Postgres => vec![format!(
                "CREATE TABLE IF NOT EXISTS {table} (\
                 id SERIAL PRIMARY KEY, {columns}, \
                 CONSTRAINT {table}_unique_index UNIQUE ({COLUMN_LIST}))"
            )],
            Driver::MySql => vec![format!(
                "CREATE TABLE IF NOT EXISTS {table} (\
                 id BIGINT UNSIGNED NOT NULL AUTO_INCREMENT PRIMARY KEY, {columns}, \
                 UNIQUE KEY unique_index ({COLUMN_LIST})\
                 ) ENGINE=InnoDB DEFAULT CHARSET=utf8"
            )],
            Driver::Sqlite => vec![
                format!(
                    "CREATE TABLE IF NOT EXISTS {table} (\
                     id INTEGER PRIMARY KEY AUTOINCREMENT, {columns})"
                ),
                format!(
                    "CREATE UNIQUE INDEX IF NOT EXISTS {table}_unique_index \
                     ON {table} ({COLUMN_LIST})"
                ),
            ],
        }
    }

    pub(crate) fn select_all(&self) -> String {
        format!("SELECT {COLUMN_LIST} FROM {} ORDER BY id", self.table)
    }

    pub(crate) fn delete_all(&self) -> String {
        format!("DELETE FROM {}", self.table)
    }

    pub(crate) fn insert_batch(&self, rows: usize) -> String {
        let values: Vec<String> = (0..rows)
            .map(|row| self.row_placeholders(row * 7 + 1))
            .collect();
        format!(
            "INSERT INTO {} ({COLUMN_LIST}) VALUES {}",
            self.table,
            values.join(", ")
        )
    }

    pub(crate) fn insert_ignore(&self) -> String {
        let values = self.row_placeholders(1);
        let table = &self.table;
        match self.driver {
            Driver::Postgres => {
                format!("INSERT INTO {table} ({COLUMN_LIST}) VALUES {values} ON CONFLICT DO NOTHING")
            }
            Driver::MySql => format!("INSERT IGNORE INTO {table} ({COLUMN_LIST}) VALUES {values}"),
            Driver::Sqlite => {
                format!("INSERT OR IGNORE INTO {table} ({COLUMN_LIST}) VALUES {values}")
            }
        }
    }

    /// Delete the row equal to `ptype, v0..v5`.
    pub(crate) fn delete_exact(&self) -> String {
        let mut columns = vec!["ptype"];
        columns.extend(VALUE_COLUMNS);
        self.delete_matching(&columns)
    }

    /// Delete rows of one `ptype` narrowed by `columns` (bound after `ptype`).
    pub(crate) fn delete_where(&self, columns: &[&str]) -> String {
        let mut all = vec!["ptype"];
        all.extend_from_slice(columns);
        self.delete_matching(&all)
    }

    fn delete_matching(&self, columns: &[&str]) -> String {
        let clauses: Vec<String> = columns
            .iter()
            .enumerate()
            .map(|(i, column)| format!("{column} = {}", self.placeholder(i + 1)))
            .collect();
        format!("DELETE FROM {} WHERE {}", self.table, clauses.join(" AND "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn postgres_uses_numbered_placeholders() {
        let statements = Statements::new(Driver::Postgres, "casbin_rule");
        assert_eq!(
            statements.delete_where(&["v1"]),
            "DELETE FROM casbin_rule WHERE ptype = $1 AND v1 = $2"
        );
        let batch = statements.insert_batch(2);
        assert!(batch.contains("($1, $2, $3, $4, $5, $6, $7), ($8, $9"));
        assert!(batch.ends_with("$14)"));
    }

    #[test]
    fn mysql_and_sqlite_use_question_marks() {
        let mysql = Statements::new(Driver::MySql, "rules");
        assert_eq!(
            mysql.delete_where(&[]),
            "DELETE FROM rules WHERE ptype = ?"
        );
        assert!(mysql.insert_ignore().starts_with("INSERT IGNORE INTO rules"));
        let sqlite = Statements::new(Driver::Sqlite, "rules");
        assert!(sqlite.insert_ignore().starts_with("INSERT OR IGNORE INTO rules"));
        assert_eq!(sqlite.create_table().len(), 2);
    }

    #[test]
    fn column_width_follows_driver() {
        let mysql = Statements::new(Driver::MySql, "rules").create_table();
        assert!(mysql[0].contains("v5 VARCHAR(128) NOT NULL DEFAULT ''"));
        assert!(!mysql[0].contains("VARCHAR(512)"));
        for driver in [Driver::Postgres, Driver::Sqlite] {
            let ddl = Statements::new(driver, "rules").create_table();
            assert!(ddl[0].contains("ptype VARCHAR(512) NOT NULL DEFAULT ''"));
        }
    }

    #[test]
    fn exact_delete_covers_every_column() {
        let sql = Statements::new(Driver::Sqlite, "casbin_rule").delete_exact();
        for column in ["ptype", "v0", "v5"] {
            assert!(sql.contains(&format!("{column} = ?")));
        }
    }
}
