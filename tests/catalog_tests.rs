//! Tests for object type resolution and the type catalog
//!
//! These tests run against the in-memory native client and check name
//! resolution, caching, native type selection and teardown.

use std::sync::Arc;
use std::thread;

use oracle_dbobject::{
    CollectionType, Config, DataTypeDef, Error, MemoryClient, NativeType, OracleType, TypeCatalog,
    TypeDef,
};

fn hr_client() -> Arc<MemoryClient> {
    let client = MemoryClient::new("HR")
        .with_type(
            TypeDef::record("HR", "PERSON")
                .attribute("ID", DataTypeDef::number(10, 0))
                .attribute("NAME", DataTypeDef::varchar(50))
                .attribute("BIRTH", DataTypeDef::date())
                .attribute("SALARY", DataTypeDef::number(10, 2)),
        )
        .with_type(
            TypeDef::record("HR", "NODE")
                .attribute("VAL", DataTypeDef::number(5, 0))
                .attribute("NEXT", DataTypeDef::object("HR.NODE")),
        )
        .with_type(
            TypeDef::record("HR", "PRECISE")
                .attribute("SMALL", DataTypeDef::number(19, 0))
                .attribute("BIG", DataTypeDef::number(20, 0))
                .attribute("LOOSE", DataTypeDef::unconstrained_number())
                .attribute("RATIO", DataTypeDef::binary_double()),
        )
        .with_type(TypeDef::collection(
            "HR",
            "PERSON_LIST",
            CollectionType::NestedTable,
            DataTypeDef::object("HR.PERSON"),
        ))
        .with_type(
            TypeDef::record("HR", "REC")
                .in_package("PKG")
                .attribute("CODE", DataTypeDef::varchar(10)),
        )
        .with_type(
            TypeDef::record("HR", "mixedCase").attribute("X", DataTypeDef::number(3, 0)),
        );
    Arc::new(client)
}

fn catalog(client: &Arc<MemoryClient>) -> TypeCatalog {
    TypeCatalog::new(client.clone(), Config::default())
}

mod resolution_tests {
    use super::*;

    #[test]
    fn test_unquoted_name_is_upper_cased() {
        let client = hr_client();
        let catalog = catalog(&client);

        let person = catalog.get_object_type("person").unwrap();
        assert_eq!(person.schema(), "HR");
        assert_eq!(person.name(), "PERSON");
        assert_eq!(person.full_name(), "HR.PERSON");
        assert_eq!(person.to_string(), "HR.PERSON");
        assert!(person.is_object());
        assert!(!person.is_collection());
        assert_eq!(person.oracle_type(), OracleType::Object);

        catalog.close().unwrap();
    }

    #[test]
    fn test_quoted_name_is_verbatim() {
        let client = hr_client();
        let catalog = catalog(&client);

        let mixed = catalog.get_object_type("\"mixedCase\"").unwrap();
        assert_eq!(mixed.name(), "mixedCase");

        let err = catalog.get_object_type("\"MIXEDCASE\"").unwrap_err();
        assert!(err.is_not_found(), "{}", err);

        catalog.close().unwrap();
    }

    #[test]
    fn test_unquoted_falls_back_to_verbatim() {
        let client = hr_client();
        let catalog = catalog(&client);

        // MIXEDCASE does not exist, the verbatim spelling does
        let mixed = catalog.get_object_type("mixedCase").unwrap();
        assert_eq!(mixed.full_name(), "HR.mixedCase");
        assert_eq!(client.lookup_count(), 2);

        catalog.close().unwrap();
    }

    #[test]
    fn test_attribute_names_in_declaration_order() {
        let client = hr_client();
        let catalog = catalog(&client);

        let person = catalog.get_object_type("HR.PERSON").unwrap();
        assert_eq!(person.attribute_names(), vec!["ID", "NAME", "BIRTH", "SALARY"]);
        let sequences: Vec<usize> = person.attributes().iter().map(|a| a.sequence()).collect();
        assert_eq!(sequences, vec![0, 1, 2, 3]);

        let name = person.attribute("NAME").unwrap();
        assert_eq!(name.object_type().oracle_type(), OracleType::Varchar);
        assert_eq!(name.object_type().full_name(), "VARCHAR2");
        assert!(person.attribute("name").is_none());

        catalog.close().unwrap();
    }

    #[test]
    fn test_package_type_full_name() {
        let client = hr_client();
        let catalog = catalog(&client);

        let rec = catalog.get_object_type("HR.PKG.REC").unwrap();
        assert_eq!(rec.package_name(), "PKG");
        assert_eq!(rec.full_name(), "HR.PKG.REC");

        catalog.close().unwrap();
    }

    #[test]
    fn test_collection_element_type() {
        let client = hr_client();
        let catalog = catalog(&client);

        let list = catalog.get_object_type("PERSON_LIST").unwrap();
        assert!(list.is_collection());
        assert_eq!(list.collection_type(), Some(CollectionType::NestedTable));
        assert!(list.attributes().is_empty());

        let element = list.element_type().unwrap();
        let person = catalog.get_object_type("PERSON").unwrap();
        assert!(Arc::ptr_eq(&element, &person));

        catalog.close().unwrap();
    }

    #[test]
    fn test_self_referential_type() {
        let client = hr_client();
        let catalog = catalog(&client);

        let node = catalog.get_object_type("NODE").unwrap();
        let next = node.attribute("NEXT").unwrap();
        assert!(Arc::ptr_eq(next.object_type(), &node));

        catalog.close().unwrap();
        assert!(node.is_closed());
    }

    #[test]
    fn test_empty_name() {
        let client = hr_client();
        let catalog = catalog(&client);

        assert!(matches!(catalog.get_object_type(""), Err(Error::EmptyTypeName)));
        assert_eq!(client.lookup_count(), 0);
    }

    #[test]
    fn test_unknown_type() {
        let client = hr_client();
        let catalog = catalog(&client);

        let err = catalog.get_object_type("NOPE").unwrap_err();
        assert!(err.is_not_found(), "{}", err);
        assert!(!err.is_connection_broken());
        assert!(err.to_string().contains("NOPE"));
        assert_eq!(catalog.cached_len(), 0);
    }

    #[test]
    fn test_new_collection_on_record() {
        let client = hr_client();
        let catalog = catalog(&client);

        let person = catalog.get_object_type("PERSON").unwrap();
        assert!(matches!(person.new_collection(), Err(Error::NotCollection(_))));

        catalog.close().unwrap();
        assert_eq!(client.live_objects(), 0);
    }
}

mod native_type_tests {
    use super::*;

    #[test]
    fn test_number_precision_limits() {
        let client = hr_client();
        let catalog = catalog(&client);
        let precise = catalog.get_object_type("PRECISE").unwrap();

        let native = |name: &str| precise.attribute(name).unwrap().object_type().native_type();
        assert_eq!(native("SMALL"), Some(NativeType::Int64));
        assert_eq!(native("BIG"), Some(NativeType::Bytes));
        assert_eq!(native("LOOSE"), Some(NativeType::Bytes));
        assert_eq!(native("RATIO"), Some(NativeType::Double));

        let person = catalog.get_object_type("PERSON").unwrap();
        let salary = person.attribute("SALARY").unwrap();
        assert_eq!(salary.object_type().native_type(), Some(NativeType::Bytes));
        assert_eq!(salary.object_type().precision(), 10);
        assert_eq!(salary.object_type().scale(), 2);

        catalog.close().unwrap();
    }

    #[test]
    fn test_big_number_goes_through_text() {
        let client = hr_client();
        let catalog = catalog(&client);
        let precise = catalog.get_object_type("PRECISE").unwrap();

        let obj = precise.new_object().unwrap();
        obj.set("SMALL", i64::MAX).unwrap();
        obj.set("BIG", "12345678901234567890").unwrap();

        assert_eq!(obj.get("SMALL").unwrap().as_i64(), Some(i64::MAX));
        let big = obj.get("BIG").unwrap();
        assert_eq!(big.as_str(), Some("12345678901234567890"));

        obj.close().unwrap();
        catalog.close().unwrap();
    }
}

mod cache_tests {
    use super::*;

    #[test]
    fn test_cached_under_requested_and_full_name() {
        let client = hr_client();
        let catalog = catalog(&client);

        let a = catalog.get_object_type("person").unwrap();
        let b = catalog.get_object_type("HR.PERSON").unwrap();
        let c = catalog.get_object_type("PERSON").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&a, &c));
        assert_eq!(client.lookup_count(), 1);

        catalog.close().unwrap();
    }

    #[test]
    fn test_default_schema_hits_qualified_entry() {
        let client = hr_client();
        let catalog = TypeCatalog::new(client.clone(), Config::default().default_schema("HR"));

        let qualified = catalog.get_object_type("HR.PERSON").unwrap();
        let bare = catalog.get_object_type("person").unwrap();
        assert!(Arc::ptr_eq(&qualified, &bare));
        assert_eq!(client.lookup_count(), 1);

        catalog.close().unwrap();
    }

    #[test]
    fn test_without_default_schema_bare_name_is_looked_up() {
        let client = hr_client();
        let catalog = catalog(&client);

        let qualified = catalog.get_object_type("HR.PERSON").unwrap();
        let bare = catalog.get_object_type("PERSON").unwrap();
        assert!(Arc::ptr_eq(&qualified, &bare));
        assert_eq!(client.lookup_count(), 2);

        catalog.close().unwrap();
    }

    #[test]
    fn test_concurrent_warm_resolution() {
        let client = hr_client();
        let catalog = Arc::new(catalog(&client));
        let first = catalog.get_object_type("PERSON").unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let catalog = Arc::clone(&catalog);
                thread::spawn(move || catalog.get_object_type("PERSON").unwrap())
            })
            .collect();
        for handle in handles {
            let entry = handle.join().unwrap();
            assert!(Arc::ptr_eq(&entry, &first));
        }
        assert_eq!(client.lookup_count(), 1);

        catalog.close().unwrap();
    }

    #[test]
    fn test_concurrent_cold_resolution() {
        let client = hr_client();
        let catalog = Arc::new(catalog(&client));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let catalog = Arc::clone(&catalog);
                thread::spawn(move || catalog.get_object_type("PERSON_LIST").unwrap())
            })
            .collect();
        let entries: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(entries.iter().all(|e| Arc::ptr_eq(e, &entries[0])));
        assert_eq!(client.lookup_count(), 1);

        catalog.close().unwrap();
    }

    #[test]
    fn test_closed_entry_is_evicted() {
        let client = hr_client();
        let catalog = catalog(&client);

        let old = catalog.get_object_type("PERSON").unwrap();
        old.close().unwrap();
        old.close().unwrap();
        assert!(old.is_closed());
        assert!(matches!(old.new_object(), Err(Error::TypeClosed(_))));

        let fresh = catalog.get_object_type("PERSON").unwrap();
        assert!(!fresh.is_closed());
        assert!(!Arc::ptr_eq(&old, &fresh));
        assert_eq!(client.lookup_count(), 2);

        catalog.close().unwrap();
    }

    #[test]
    fn test_close_releases_type_handles() {
        let client = hr_client();
        let catalog = catalog(&client);

        catalog.get_object_type("PERSON_LIST").unwrap();
        catalog.get_object_type("NODE").unwrap();
        catalog.get_object_type("PRECISE").unwrap();
        assert!(client.live_type_handles() > 0);

        catalog.close().unwrap();
        assert_eq!(catalog.cached_len(), 0);
        assert_eq!(client.live_type_handles(), 0);
    }
}

mod connection_tests {
    use super::*;

    #[test]
    fn test_disconnected_client() {
        let client = hr_client();
        let catalog = catalog(&client);
        client.disconnect();

        let err = catalog.get_object_type("PERSON").unwrap_err();
        assert!(err.is_connection_broken(), "{}", err);
        assert!(!err.is_not_found());

        client.reconnect();
        assert!(catalog.get_object_type("PERSON").is_ok());
        catalog.close().unwrap();
    }

    #[test]
    fn test_session_unusable_is_connection_broken() {
        let client = hr_client();
        let catalog = catalog(&client);
        client.fail_lookups_with_session_error(true);

        let err = catalog.get_object_type("PERSON").unwrap_err();
        assert!(err.is_connection_broken(), "{}", err);
        assert!(err.native_error().is_some());
        // no retry with the verbatim name once the session is gone
        assert_eq!(client.lookup_count(), 1);

        client.clear_faults();
        assert!(catalog.get_object_type("PERSON").is_ok());
        catalog.close().unwrap();
    }

    #[test]
    fn test_warm_name_survives_disconnect() {
        let client = hr_client();
        let catalog = catalog(&client);
        let person = catalog.get_object_type("PERSON").unwrap();
        client.disconnect();

        let again = catalog.get_object_type("PERSON").unwrap();
        assert!(Arc::ptr_eq(&person, &again));
        catalog.close().unwrap();
    }
}
