// Session module - units of work, their factory and configuration

pub mod config;
pub mod factory;
pub mod mapper;
#[allow(clippy::module_inception)]
pub mod session;

pub use config::{Configuration, Settings};
pub use factory::SessionFactory;
pub use mapper::{Mapper, MapperDefinition, MapperMethod, ReturnKind};
pub use session::Session;

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;
    use crate::core::{MappedStatement, SqlCommandType, StaticSqlSource, Value};
    use crate::storage::MemoryDriver;
    use super::{Configuration, SessionFactory, Settings};

    /// Factory over three users with a cached `user` namespace
    pub fn factory() -> (SessionFactory, MemoryDriver) {
        factory_with(Settings::default())
    }

    pub fn factory_with(settings: Settings) -> (SessionFactory, MemoryDriver) {
        let driver = MemoryDriver::new();
        driver.create_table("users", &["id", "name"]);
        for (id, name) in [(1, "alice"), (2, "bob"), (3, "carol")] {
            driver
                .insert_row("users", vec![Value::Integer(id), Value::from(name)])
                .unwrap();
        }
        driver.select_by("SELECT * FROM users WHERE id = ?", "users", "id");
        driver.select_all("SELECT * FROM users", "users");
        driver.update_by("UPDATE users SET name = ? WHERE id = ?", "users", "name", "id");
        driver.insert_into("INSERT INTO users VALUES (?, ?)", "users");
        driver.delete_by("DELETE FROM users WHERE id = ?", "users", "id");

        let mut configuration = Configuration::new(settings);
        let cache = configuration.namespace_cache("user");
        let statements = [
            ("user.findById", SqlCommandType::Select, "SELECT * FROM users WHERE id = ?", vec!["id"]),
            ("user.findAll", SqlCommandType::Select, "SELECT * FROM users", vec![]),
            ("user.rename", SqlCommandType::Update, "UPDATE users SET name = ? WHERE id = ?", vec!["name", "id"]),
            ("user.insert", SqlCommandType::Insert, "INSERT INTO users VALUES (?, ?)", vec!["id", "name"]),
            ("user.delete", SqlCommandType::Delete, "DELETE FROM users WHERE id = ?", vec!["id"]),
        ];
        for (id, command, sql, mappings) in statements {
            let source = Arc::new(StaticSqlSource::new(sql).with_mappings(mappings));
            configuration
                .add_mapped_statement(MappedStatement::builder(id, command, source).cache(Arc::clone(&cache)).build())
                .unwrap();
        }
        let factory = SessionFactory::new(configuration, Arc::new(driver.clone()));
        (factory, driver)
    }
}
