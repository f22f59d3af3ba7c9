//! Tests for the ORA-21602 retry through PL/SQL
//!
//! The execution layer is played by a test executor that performs the
//! assignment the generated block describes.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use oracle_dbobject::{
    set_attribute_with_fallback, Bind, Config, Data, DataTypeDef, Error, MemoryClient,
    NativeError, Result, StatementExecutor, TypeCatalog, TypeDef,
};

fn hr_client() -> Arc<MemoryClient> {
    let client = MemoryClient::new("HR").with_type(
        TypeDef::record("HR", "PERSON")
            .attribute("ID", DataTypeDef::number(10, 0))
            .attribute("NAME", DataTypeDef::varchar(50)),
    );
    Arc::new(client)
}

/// Runs the generated block by lifting the fault and assigning directly
struct PlsqlEmulator {
    client: Arc<MemoryClient>,
    attribute: &'static str,
    fail: bool,
    statements: Mutex<Vec<String>>,
}

impl PlsqlEmulator {
    fn new(client: &Arc<MemoryClient>, attribute: &'static str, fail: bool) -> Self {
        Self {
            client: client.clone(),
            attribute,
            fail,
            statements: Mutex::new(Vec::new()),
        }
    }

    fn statements(&self) -> Vec<String> {
        self.statements.lock().unwrap().clone()
    }
}

#[async_trait]
impl StatementExecutor for PlsqlEmulator {
    async fn execute(&self, sql: &str, binds: &[Bind<'_>]) -> Result<()> {
        self.statements.lock().unwrap().push(sql.to_string());
        if self.fail {
            return Err(Error::native(
                "execute",
                NativeError::oracle(6550, "line 1, column 7: PLS-00201", "dpiStmt_execute"),
            ));
        }
        let (value, target) = match binds {
            [Bind::Object(_), Bind::Data(data), Bind::ObjectOut(target)] => (data.get_value()?, *target),
            other => panic!("unexpected binds {:?}", other),
        };
        self.client.clear_faults();
        target.set(self.attribute, value)
    }
}

mod fallback_tests {
    use super::*;

    #[tokio::test]
    async fn test_retry_succeeds() {
        let client = hr_client();
        let catalog = TypeCatalog::new(client.clone(), Config::default());
        let obj = catalog.get_object_type("PERSON").unwrap().new_object().unwrap();
        client.fail_set_attribute("HR.PERSON", "NAME");

        let mut data = Data::new();
        data.set_string("Ada");
        let direct = obj.set_attribute("NAME", &mut data).unwrap_err();
        assert!(direct.is_server_limitation(), "{}", direct);

        // the block names the attribute as declared
        let executor = PlsqlEmulator::new(&client, "NAME", false);
        set_attribute_with_fallback(&executor, &obj, "name", &mut data)
            .await
            .unwrap();

        assert_eq!(
            executor.statements(),
            vec!["DECLARE\n  v_obj HR.PERSON := :1;\nBEGIN\n  v_obj.NAME := :2;\n  :3 := v_obj;\nEND;"]
        );
        assert_eq!(obj.get("NAME").unwrap().as_str(), Some("Ada"));

        obj.close().unwrap();
        catalog.close().unwrap();
    }

    #[tokio::test]
    async fn test_both_attempts_fail() {
        let client = hr_client();
        let catalog = TypeCatalog::new(client.clone(), Config::default());
        let obj = catalog.get_object_type("PERSON").unwrap().new_object().unwrap();
        client.fail_set_attribute("HR.PERSON", "NAME");

        let executor = PlsqlEmulator::new(&client, "NAME", true);
        let mut data = Data::new();
        data.set_string("Ada");
        let err = set_attribute_with_fallback(&executor, &obj, "NAME", &mut data)
            .await
            .unwrap_err();

        match &err {
            Error::FallbackFailed {
                statement,
                retry,
                original,
            } => {
                assert!(statement.starts_with("DECLARE"));
                assert!(original.is_server_limitation());
                assert_eq!(retry.native_error().map(|e| e.code), Some(6550));
            }
            other => panic!("unexpected error {:?}", other),
        }
        let text = err.to_string();
        assert!(text.contains("ORA-21602"), "{}", text);
        assert!(text.contains("ORA-06550"), "{}", text);
        assert_eq!(executor.statements().len(), 1);

        client.clear_faults();
        obj.close().unwrap();
        catalog.close().unwrap();
    }

    #[tokio::test]
    async fn test_retry_disabled() {
        let client = hr_client();
        let catalog = TypeCatalog::new(client.clone(), Config::default().limitation_fallback(false));
        let obj = catalog.get_object_type("PERSON").unwrap().new_object().unwrap();
        client.fail_set_attribute("HR.PERSON", "NAME");

        let executor = PlsqlEmulator::new(&client, "NAME", false);
        let mut data = Data::new();
        data.set_string("Ada");
        let err = set_attribute_with_fallback(&executor, &obj, "NAME", &mut data)
            .await
            .unwrap_err();
        assert!(err.is_server_limitation());
        assert!(executor.statements().is_empty());

        client.clear_faults();
        obj.close().unwrap();
        catalog.close().unwrap();
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let client = hr_client();
        let catalog = TypeCatalog::new(client.clone(), Config::default());
        let obj = catalog.get_object_type("PERSON").unwrap().new_object().unwrap();

        let executor = PlsqlEmulator::new(&client, "ID", false);
        let mut data = Data::new();
        data.set_bool(true);
        let err = set_attribute_with_fallback(&executor, &obj, "ID", &mut data)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnhandledConversion { .. }), "{}", err);

        data.set_i64(5);
        set_attribute_with_fallback(&executor, &obj, "ID", &mut data)
            .await
            .unwrap();
        assert_eq!(obj.get("ID").unwrap().as_i64(), Some(5));
        assert!(executor.statements().is_empty());

        obj.close().unwrap();
        catalog.close().unwrap();
    }
}
