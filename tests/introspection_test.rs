//! Integration tests for the introspection stages and the generation run.

mod common;

use std::sync::Arc;

use common::{FakeCatalog, column_row, datasource, describe_error_row, parameter_row};
use sproc_inspector::error::DbError;
use sproc_inspector::generator::Generator;
use sproc_inspector::introspect::{ParameterMapper, ResultMapper, RoutineLister};
use sproc_inspector::models::SemanticType;

fn person_catalog() -> FakeCatalog {
    FakeCatalog::new().with_routine(
        "usp_GetPerson",
        vec![
            parameter_row(1, Some("@id"), "uniqueidentifier", 16, false),
            parameter_row(2, Some("@name"), "varchar", 50, true),
        ],
        vec![column_row(Some("name"), "nvarchar(100)", 100, true)],
    )
}

#[tokio::test]
async fn test_parameters_of_person_routine() {
    let catalog = Arc::new(person_catalog());
    let db = datasource(catalog);

    let inspection = ParameterMapper::new(&db, "usp_GetPerson")
        .execute()
        .await
        .unwrap()
        .expect("all parameter types are supported");

    assert!(!inspection.is_empty_type);
    assert!(!inspection.is_plain_type);
    assert_eq!(inspection.attributes.len(), 2);

    let id = &inspection.attributes[0];
    assert_eq!(id.name.as_deref(), Some("id"));
    assert_eq!(id.type_descriptor.native_type, SemanticType::String);
    assert_eq!(id.type_descriptor.wire_type, "UniqueIdentifier()");
    assert!(!id.optional);

    let name = &inspection.attributes[1];
    assert_eq!(name.name.as_deref(), Some("name"));
    assert_eq!(name.type_descriptor.native_type, SemanticType::String);
    assert_eq!(name.type_descriptor.wire_type, "VarChar(50)");
    assert_eq!(name.type_descriptor.display_type, "varchar(50)");
    assert!(name.optional);
}

#[tokio::test]
async fn test_results_of_person_routine() {
    let catalog = Arc::new(person_catalog());
    let db = datasource(catalog);

    let inspection = ResultMapper::new(&db, "usp_GetPerson")
        .execute()
        .await
        .unwrap()
        .expect("all column types are supported");

    assert!(!inspection.is_empty_type);
    assert!(!inspection.is_plain_type);
    assert!(inspection.error_message.is_none());
    assert_eq!(inspection.attributes.len(), 1);

    let column = &inspection.attributes[0];
    assert_eq!(column.name.as_deref(), Some("name"));
    assert_eq!(column.type_descriptor.native_type, SemanticType::String);
    assert_eq!(column.type_descriptor.wire_type, "NVarChar(50)");
    assert_eq!(column.type_descriptor.display_type, "nvarchar(50)");
    assert!(column.optional);
}

#[tokio::test]
async fn test_routine_without_parameters_is_empty() {
    let catalog = Arc::new(FakeCatalog::new().with_routine("usp_Ping", vec![], vec![]));
    let db = datasource(catalog);

    let parameters = ParameterMapper::new(&db, "usp_Ping")
        .execute()
        .await
        .unwrap()
        .unwrap();
    assert!(parameters.is_empty_type);
    assert!(!parameters.is_plain_type);
    assert!(parameters.attributes.is_empty());

    let results = ResultMapper::new(&db, "usp_Ping")
        .execute()
        .await
        .unwrap()
        .unwrap();
    assert!(results.is_empty_type);
}

#[tokio::test]
async fn test_single_unnamed_parameter_is_plain() {
    let catalog = Arc::new(FakeCatalog::new().with_routine(
        "usp_Count",
        vec![parameter_row(0, None, "int", 4, false)],
        vec![column_row(None, "int", 4, false)],
    ));
    let db = datasource(catalog);

    let parameters = ParameterMapper::new(&db, "usp_Count")
        .execute()
        .await
        .unwrap()
        .unwrap();
    assert!(parameters.is_plain_type);
    assert!(parameters.attributes[0].name.is_none());
    assert_eq!(
        parameters.attributes[0].type_descriptor.native_type,
        SemanticType::Number
    );

    let results = ResultMapper::new(&db, "usp_Count")
        .execute()
        .await
        .unwrap()
        .unwrap();
    assert!(results.is_plain_type);
}

#[tokio::test]
async fn test_single_empty_named_record_is_plain() {
    let catalog = Arc::new(FakeCatalog::new().with_routine(
        "usp_Total",
        vec![parameter_row(0, Some(""), "int", 4, false)],
        vec![column_row(Some(""), "int", 4, false)],
    ));
    let db = datasource(catalog);

    let parameters = ParameterMapper::new(&db, "usp_Total")
        .execute()
        .await
        .unwrap()
        .unwrap();
    assert!(!parameters.is_empty_type);
    assert!(parameters.is_plain_type);
    assert!(parameters.attributes[0].name.is_none());

    let results = ResultMapper::new(&db, "usp_Total")
        .execute()
        .await
        .unwrap()
        .unwrap();
    assert!(!results.is_empty_type);
    assert!(results.is_plain_type);
    assert!(results.attributes[0].name.is_none());
}

#[tokio::test]
async fn test_unsupported_parameter_type_yields_none() {
    let catalog = Arc::new(FakeCatalog::new().with_routine(
        "usp_SaveDocument",
        vec![
            parameter_row(1, Some("@id"), "int", 4, false),
            parameter_row(2, Some("@document"), "xml", -1, true),
        ],
        vec![],
    ));
    let db = datasource(catalog);

    let inspection = ParameterMapper::new(&db, "usp_SaveDocument")
        .execute()
        .await
        .unwrap();
    assert!(inspection.is_none());
}

#[tokio::test]
async fn test_unsupported_result_type_yields_none() {
    let catalog = Arc::new(FakeCatalog::new().with_routine(
        "usp_Locations",
        vec![],
        vec![
            column_row(Some("id"), "int", 4, false),
            column_row(Some("position"), "geography", -1, true),
        ],
    ));
    let db = datasource(catalog);

    let inspection = ResultMapper::new(&db, "usp_Locations")
        .execute()
        .await
        .unwrap();
    assert!(inspection.is_none());
}

#[tokio::test]
async fn test_undescribable_results_are_a_soft_failure() {
    let catalog = Arc::new(FakeCatalog::new().with_routine(
        "usp_Dynamic",
        vec![],
        vec![describe_error_row("DYNAMIC_SQL")],
    ));
    let db = datasource(catalog);

    let inspection = ResultMapper::new(&db, "usp_Dynamic")
        .execute()
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        inspection.error_message.as_deref(),
        Some("Failed to inspect the results of usp_Dynamic: DYNAMIC_SQL")
    );
    assert!(inspection.attributes.is_empty());
}

#[tokio::test]
async fn test_temporary_routines_are_not_listed() {
    let catalog = Arc::new(
        FakeCatalog::new()
            .with_routine("usp_First", vec![], vec![])
            .with_routine("#scratch", vec![], vec![])
            .with_routine("usp_Second", vec![], vec![]),
    );
    let db = datasource(catalog);

    let routines = RoutineLister::new(&db).execute().await.unwrap();
    let names: Vec<_> = routines.into_iter().map(|r| r.name).collect();
    assert_eq!(names, vec!["usp_First", "usp_Second"]);
}

#[tokio::test]
async fn test_generate_inspects_and_skips() {
    let catalog = Arc::new(
        person_catalog()
            .with_routine(
                "usp_SaveDocument",
                vec![parameter_row(1, Some("@document"), "xml", -1, false)],
                vec![],
            )
            .with_routine(
                "usp_Locations",
                vec![],
                vec![column_row(Some("position"), "geography", -1, true)],
            )
            .with_routine("#scratch", vec![], vec![]),
    );
    let generator = Generator::new(datasource(Arc::clone(&catalog)));

    let output = generator.generate().await.unwrap();

    assert_eq!(
        output.routine_names,
        vec!["usp_GetPerson", "usp_SaveDocument", "usp_Locations"]
    );
    assert_eq!(output.skipped, vec!["usp_SaveDocument", "usp_Locations"]);
    assert_eq!(output.routines.len(), 1);
    assert_eq!(output.routines[0].name, "usp_GetPerson");
    assert_eq!(output.routines[0].parameters.attributes.len(), 2);
    assert_eq!(output.routines[0].results.attributes.len(), 1);

    // Results are not described once the parameters were rejected
    assert_eq!(catalog.described(), vec!["usp_GetPerson", "usp_Locations"]);

    generator.shutdown().await;
    assert!(generator.datasource().registry().is_empty().await);
}

#[tokio::test]
async fn test_generate_output_serializes_camel_case() {
    let catalog = Arc::new(person_catalog());
    let generator = Generator::new(datasource(catalog));

    let output = generator.generate().await.unwrap();
    let value = serde_json::to_value(&output).unwrap();

    assert_eq!(value["routineNames"][0], "usp_GetPerson");
    let results = &value["routines"][0]["results"];
    assert_eq!(results["isEmptyType"], false);
    assert_eq!(results["attributes"][0]["type"]["nativeType"], "string");
    assert_eq!(results["attributes"][0]["type"]["wireType"], "NVarChar(50)");
    assert!(results.get("errorMessage").is_none());
}

#[tokio::test]
async fn test_generate_aborts_on_database_error() {
    let catalog = Arc::new(person_catalog());
    catalog.fail_queries();
    let generator = Generator::new(datasource(catalog));

    let err = generator.generate().await.unwrap_err();
    assert!(matches!(err, DbError::Database { .. }));
    assert_eq!(
        err.to_string(),
        "Received an error while executing a database operation"
    );
    assert_eq!(err.code(), Some("EREQUEST"));
}
