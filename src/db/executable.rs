//! Parameter-bindable executables.
//!
//! A [`Statement`] carries raw query text and a [`RoutineCall`] names a stored
//! procedure. Both collect [`Parameter`]s in insertion order and bind a
//! snapshot of them to a fresh [`SqlRequest`] on every execution.

use async_trait::async_trait;
use uuid::Uuid;

use crate::db::params::{Parameter, SqlType};
use crate::error::DriverError;
use crate::models::{QueryResult, SqlValue};

/// A single-use request bound to one pool.
///
/// `query` and `execute` consume the request, so a request can never be
/// dispatched twice.
#[async_trait]
pub trait SqlRequest: Send {
    /// Bind one input parameter.
    fn input(&mut self, parameter: Parameter);

    /// Run raw query text.
    async fn query(self: Box<Self>, sql: &str) -> Result<QueryResult, DriverError>;

    /// Invoke a stored procedure by name.
    async fn execute(self: Box<Self>, routine: &str) -> Result<QueryResult, DriverError>;
}

/// Shared parameter handling for statements and routine calls.
pub trait Parametrized {
    fn parameters_ref(&self) -> &[Parameter];

    fn parameters_mut(&mut self) -> &mut Vec<Parameter>;

    /// Append one parameter.
    fn with_parameter(mut self, parameter: Parameter) -> Self
    where
        Self: Sized,
    {
        self.parameters_mut().push(parameter);
        self
    }

    /// Append several parameters, keeping their order.
    fn with_parameters(mut self, parameters: impl IntoIterator<Item = Parameter>) -> Self
    where
        Self: Sized,
    {
        self.parameters_mut().extend(parameters);
        self
    }

    fn add_parameter(
        &mut self,
        name: impl Into<String>,
        value: impl Into<SqlValue>,
        sql_type: SqlType,
    ) -> &mut Self
    where
        Self: Sized,
    {
        self.parameters_mut().push(Parameter::new(name, value, sql_type));
        self
    }

    /// Copy of the current parameter list.
    fn parameters(&self) -> Vec<Parameter> {
        self.parameters_ref().to_vec()
    }

    /// Bind a snapshot of the parameters to `request`, in insertion order.
    fn bind_to(&self, request: &mut dyn SqlRequest) {
        for parameter in self.parameters() {
            request.input(parameter);
        }
    }
}

/// Raw query text plus its parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    sql: String,
    parameters: Vec<Parameter>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            parameters: Vec::new(),
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Bind every parameter and run the text, returning the raw result.
    pub async fn execute(
        &self,
        mut request: Box<dyn SqlRequest>,
    ) -> Result<QueryResult, DriverError> {
        self.bind_to(request.as_mut());
        request.query(&self.sql).await
    }
}

impl Parametrized for Statement {
    fn parameters_ref(&self) -> &[Parameter] {
        &self.parameters
    }

    fn parameters_mut(&mut self) -> &mut Vec<Parameter> {
        &mut self.parameters
    }
}

/// Stored procedure invocation plus its parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutineCall {
    name: String,
    parameters: Vec<Parameter>,
}

impl RoutineCall {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a `uniqueidentifier` parameter, generating a random value when none
    /// is given.
    pub fn add_identifier_parameter(
        &mut self,
        name: impl Into<String>,
        value: Option<Uuid>,
    ) -> &mut Self {
        let value = value.unwrap_or_else(Uuid::new_v4);
        self.add_parameter(name, value, SqlType::UniqueIdentifier)
    }

    /// Bind every parameter and invoke the routine, returning the raw result.
    pub async fn execute(
        &self,
        mut request: Box<dyn SqlRequest>,
    ) -> Result<QueryResult, DriverError> {
        self.bind_to(request.as_mut());
        request.execute(&self.name).await
    }
}

impl Parametrized for RoutineCall {
    fn parameters_ref(&self) -> &[Parameter] {
        &self.parameters
    }

    fn parameters_mut(&mut self) -> &mut Vec<Parameter> {
        &mut self.parameters
    }
}
