//! Tests for the collection view
//!
//! Nested tables, VARRAYs and sparse PL/SQL index-by tables are exercised
//! through navigation, element access, projections and JSON output.

use std::sync::Arc;

use indexmap::IndexMap;
use oracle_dbobject::{
    CollectionType, Config, Data, DataTypeDef, Error, MemoryClient, NativeType, ObjectCollection,
    TypeCatalog, TypeDef, Value,
};

fn hr_client() -> Arc<MemoryClient> {
    let client = MemoryClient::new("HR")
        .with_type(TypeDef::collection(
            "HR",
            "NUM_LIST",
            CollectionType::NestedTable,
            DataTypeDef::number(10, 0),
        ))
        .with_type(
            TypeDef::collection("HR", "NAME_ARR", CollectionType::Varray, DataTypeDef::varchar(10))
                .max_size(3),
        )
        .with_type(
            TypeDef::collection(
                "HR",
                "IDX_TAB",
                CollectionType::PlsqlIndexTable,
                DataTypeDef::varchar(20),
            )
            .in_package("PKG"),
        )
        .with_type(
            TypeDef::record("HR", "PERSON")
                .attribute("ID", DataTypeDef::number(10, 0))
                .attribute("NAME", DataTypeDef::varchar(50)),
        )
        .with_type(TypeDef::collection(
            "HR",
            "PERSON_LIST",
            CollectionType::NestedTable,
            DataTypeDef::object("HR.PERSON"),
        ))
        .with_type(TypeDef::collection(
            "HR",
            "MATRIX",
            CollectionType::NestedTable,
            DataTypeDef::object("HR.NUM_LIST"),
        ));
    Arc::new(client)
}

fn catalog(client: &Arc<MemoryClient>) -> TypeCatalog {
    TypeCatalog::new(client.clone(), Config::default().warn_unclosed(false))
}

fn new_collection(catalog: &TypeCatalog, name: &str) -> ObjectCollection {
    catalog.get_object_type(name).unwrap().new_collection().unwrap()
}

mod navigation_tests {
    use super::*;

    #[test]
    fn test_from_slice_as_slice() {
        let client = hr_client();
        let catalog = catalog(&client);
        let coll = new_collection(&catalog, "NUM_LIST");

        let values = vec![Value::from(1), Value::from(2), Value::from(3)];
        coll.from_slice(&values).unwrap();
        assert_eq!(coll.as_slice().unwrap(), values);
        assert_eq!(coll.len().unwrap(), 3);
        assert!(!coll.is_empty().unwrap());

        assert_eq!(coll.first().unwrap(), 0);
        assert_eq!(coll.last().unwrap(), 2);
        assert_eq!(coll.next(0).unwrap(), 1);
        assert_eq!(coll.prev(2).unwrap(), 1);
        assert!(coll.next(2).unwrap_err().is_not_exist());
        assert!(coll.prev(0).unwrap_err().is_not_exist());

        coll.close().unwrap();
        catalog.close().unwrap();
    }

    #[test]
    fn test_empty_collection() {
        let client = hr_client();
        let catalog = catalog(&client);
        let coll = new_collection(&catalog, "NUM_LIST");

        assert!(coll.is_empty().unwrap());
        assert!(matches!(
            coll.first(),
            Err(Error::NotExist {
                operation: "first",
                index: None
            })
        ));
        assert!(coll.last().unwrap_err().is_not_exist());
        assert!(coll.indices().unwrap().is_empty());
        assert!(coll.as_slice().unwrap().is_empty());
        assert_eq!(coll.to_json_value().unwrap(), serde_json::json!([]));

        coll.close().unwrap();
        catalog.close().unwrap();
    }

    #[test]
    fn test_get_item_missing_index() {
        let client = hr_client();
        let catalog = catalog(&client);
        let coll = new_collection(&catalog, "NUM_LIST");
        coll.append_value(10).unwrap();

        let mut data = Data::new();
        coll.get_item(&mut data, 0).unwrap();
        assert_eq!(data.native_type(), Some(NativeType::Int64));
        assert_eq!(data.get_i64(), Some(10));

        let err = coll.get_item(&mut data, 5).unwrap_err();
        match err {
            Error::NotExist { operation, index } => {
                assert_eq!(operation, "get");
                assert_eq!(index, Some(5));
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(coll.get(-1).unwrap_err().is_not_exist());

        coll.close().unwrap();
        catalog.close().unwrap();
    }

    #[test]
    fn test_sparse_index_table() {
        let client = hr_client();
        let catalog = catalog(&client);
        let coll = new_collection(&catalog, "HR.PKG.IDX_TAB");

        coll.set(10, "b").unwrap();
        coll.set(-5, "a").unwrap();
        coll.set(3, Value::Null).unwrap();

        assert_eq!(coll.indices().unwrap(), vec![-5, 3, 10]);
        assert!(coll.exists(3).unwrap());
        assert!(coll.get(3).unwrap().is_null());
        assert_eq!(coll.to_json_value().unwrap(), serde_json::json!(["a", null, "b"]));

        coll.delete(3).unwrap();
        assert_eq!(coll.indices().unwrap(), vec![-5, 10]);
        assert!(!coll.exists(3).unwrap());
        assert!(coll.get(3).unwrap_err().is_not_exist());
        assert_eq!(coll.to_json_value().unwrap(), serde_json::json!(["a", "b"]));

        coll.close().unwrap();
        catalog.close().unwrap();
    }
}

mod mutation_tests {
    use super::*;

    #[test]
    fn test_set_replaces_and_rejects_gaps() {
        let client = hr_client();
        let catalog = catalog(&client);
        let coll = new_collection(&catalog, "NUM_LIST");
        coll.from_slice(&[Value::from(1), Value::from(2)]).unwrap();

        coll.set(1, 20).unwrap();
        assert_eq!(coll.get(1).unwrap(), Value::Integer(20));

        let err = coll.set(7, 70).unwrap_err();
        assert!(err.to_string().starts_with("set(7)"), "{}", err);

        coll.close().unwrap();
        catalog.close().unwrap();
    }

    #[test]
    fn test_failed_set_keeps_element() {
        let client = hr_client();
        let catalog = catalog(&client);
        let coll = new_collection(&catalog, "NAME_ARR");
        coll.append_value("abc").unwrap();

        let err = coll.set(0, "much too long").unwrap_err();
        assert!(err.to_string().starts_with("set(0)"), "{}", err);
        assert_eq!(coll.get(0).unwrap(), Value::from("abc"));
        assert_eq!(coll.len().unwrap(), 1);

        coll.close().unwrap();
        catalog.close().unwrap();
        assert_eq!(client.live_objects(), 0);
    }

    #[test]
    fn test_varray_limits() {
        let client = hr_client();
        let catalog = catalog(&client);
        let coll = new_collection(&catalog, "NAME_ARR");

        for name in ["a", "b", "c"] {
            coll.append_value(name).unwrap();
        }
        let err = coll.append_value("d").unwrap_err();
        assert!(err.to_string().starts_with("append"), "{}", err);

        let err = coll.delete(0).unwrap_err();
        assert!(err.to_string().starts_with("delete(0)"), "{}", err);

        coll.trim(1).unwrap();
        assert_eq!(coll.len().unwrap(), 2);
        assert!(coll.trim(5).unwrap_err().to_string().starts_with("trim"));
        assert_eq!(
            coll.as_slice().unwrap(),
            vec![Value::from("a"), Value::from("b")]
        );

        coll.close().unwrap();
        catalog.close().unwrap();
    }

    #[test]
    fn test_closed_collection() {
        let client = hr_client();
        let catalog = catalog(&client);
        let coll = new_collection(&catalog, "NUM_LIST");
        coll.close().unwrap();
        coll.close().unwrap();

        assert!(matches!(coll.len(), Err(Error::ObjectClosed { .. })));
        assert!(matches!(coll.append_value(1), Err(Error::ObjectClosed { .. })));
        assert_eq!(client.live_objects(), 0);
        catalog.close().unwrap();
    }

    #[test]
    fn test_record_is_not_a_collection() {
        let client = hr_client();
        let catalog = catalog(&client);
        let obj = catalog.get_object_type("PERSON").unwrap().new_object().unwrap();

        assert!(matches!(obj.into_collection(), Err(Error::NotCollection(_))));
        assert_eq!(client.live_objects(), 0);
        catalog.close().unwrap();
    }
}

mod object_element_tests {
    use super::*;

    fn person_map(id: i64, name: Option<&str>) -> IndexMap<String, Value> {
        let mut map = IndexMap::new();
        map.insert("ID".to_string(), Value::from(id));
        if let Some(name) = name {
            map.insert("NAME".to_string(), Value::from(name));
        }
        map
    }

    #[test]
    fn test_map_slice_round_trip() {
        let client = hr_client();
        let catalog = catalog(&client);
        let coll = new_collection(&catalog, "PERSON_LIST");

        let maps = vec![person_map(1, Some("Ann")), person_map(2, None)];
        coll.from_map_slice(false, &maps).unwrap();
        assert_eq!(coll.as_map_slice(false).unwrap(), maps);
        assert_eq!(client.live_objects(), 1);

        // a null element projects as an empty map
        coll.append(&Data::new()).unwrap();
        let back = coll.as_map_slice(false).unwrap();
        assert_eq!(back.len(), 3);
        assert!(back[2].is_empty());

        coll.close().unwrap();
        catalog.close().unwrap();
        assert_eq!(client.live_objects(), 0);
        assert_eq!(client.live_instances(), 0);
    }

    #[test]
    fn test_map_slice_needs_object_elements() {
        let client = hr_client();
        let catalog = catalog(&client);
        let coll = new_collection(&catalog, "NUM_LIST");

        assert!(coll.as_map_slice(false).unwrap_err().is_conversion_error());
        assert!(coll
            .from_map_slice(false, &[IndexMap::new()])
            .unwrap_err()
            .is_conversion_error());

        coll.close().unwrap();
        catalog.close().unwrap();
    }

    #[test]
    fn test_append_object_copies() {
        let client = hr_client();
        let catalog = catalog(&client);
        let coll = new_collection(&catalog, "PERSON_LIST");
        let person = catalog.get_object_type("PERSON").unwrap().new_object().unwrap();
        person.set("ID", 9).unwrap();

        coll.append_object(&person).unwrap();
        person.set("ID", 10).unwrap();

        let first = coll.get(0).unwrap();
        assert_eq!(first.as_object().unwrap().get("ID").unwrap(), Value::Integer(9));
        first.close().unwrap();

        person.close().unwrap();
        coll.close().unwrap();
        catalog.close().unwrap();
        assert_eq!(client.live_objects(), 0);
    }

    #[test]
    fn test_append_map_builds_element() {
        let client = hr_client();
        let catalog = catalog(&client);
        let coll = new_collection(&catalog, "PERSON_LIST");

        coll.append_value(Value::Map(person_map(5, Some("Eve")))).unwrap();
        assert_eq!(
            coll.to_json_value().unwrap(),
            serde_json::json!([{"ID": 5, "NAME": "Eve"}])
        );
        assert!(coll.to_string().starts_with("HR.PERSON_LIST["));

        coll.close().unwrap();
        catalog.close().unwrap();
        assert_eq!(client.live_objects(), 0);
    }

    #[test]
    fn test_collection_of_collections() {
        let client = hr_client();
        let catalog = catalog(&client);
        let matrix = new_collection(&catalog, "MATRIX");

        matrix
            .append_value(Value::List(vec![Value::from(1), Value::from(2)]))
            .unwrap();
        matrix.from_json(r#"[[3]]"#.as_bytes()).unwrap();

        assert_eq!(matrix.len().unwrap(), 2);
        assert_eq!(matrix.to_json_value().unwrap(), serde_json::json!([[1, 2], [3]]));

        let mut out = Vec::new();
        matrix.to_json(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "[[1,2],[3]]");

        matrix.close().unwrap();
        catalog.close().unwrap();
        assert_eq!(client.live_objects(), 0);
        assert_eq!(client.live_instances(), 0);
    }
}
