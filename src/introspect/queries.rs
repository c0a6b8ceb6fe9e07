//! Fixed catalog queries used by the introspection stages.

/// Name of the parameter the per-routine queries are bound with.
pub const ROUTINE_NAME_PARAMETER: &str = "stored_procedure_name";

/// Every stored procedure in the current database.
pub const LIST_ROUTINES: &str = r#"
    SELECT
        ROUTINE_SCHEMA,
        ROUTINE_NAME
    FROM INFORMATION_SCHEMA.ROUTINES
    WHERE ROUTINE_TYPE = 'PROCEDURE';
"#;

/// Parameters of one stored procedure, in declaration order. The return value
/// (parameter id 0) is reported without a name.
pub const ROUTINE_PARAMETERS: &str = r#"
    SELECT
        SCHEMA_NAME(SO.schema_id) AS [Schema],
        SO.name AS [ObjectName],
        PM.parameter_id AS [ParameterID],
        CASE
            WHEN PM.parameter_id = 0 THEN NULL
            ELSE PM.name
        END AS [ParameterName],
        TYPE_NAME(PM.user_type_id) AS [ParameterTypeName],
        CAST(PM.max_length AS INT) AS [Size],
        CAST(PM.precision AS INT) AS [Precision],
        CAST(PM.scale AS INT) AS [Scale],
        PM.is_output AS [IsOutput],
        PM.is_nullable AS [IsNullable]
    FROM sys.objects AS SO
    INNER JOIN sys.parameters AS PM ON SO.object_id = PM.object_id
    WHERE SO.type IN ('P', 'FN')
    AND SO.type_desc = 'SQL_STORED_PROCEDURE'
    AND SO.name = @stored_procedure_name
    ORDER BY SO.type_desc, [Schema], SO.name, PM.parameter_id;
"#;

/// Shape of the first result set a stored procedure returns.
pub const ROUTINE_RESULTS: &str = r#"
    SELECT * FROM sys.dm_exec_describe_first_result_set_for_object(
        OBJECT_ID(@stored_procedure_name),
        0
    );
"#;
