//! Conversions from external infrastructure errors into domain errors.

use reqwest::Error as HttpError;
use rusqlite::Error as SqlError;
use slotflow_domain::SlotflowError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub SlotflowError);

impl From<InfraError> for SlotflowError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<SlotflowError> for InfraError {
    fn from(value: SlotflowError) -> Self {
        InfraError(value)
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        InfraError(classify_sqlite(value))
    }
}

impl From<r2d2::Error> for InfraError {
    fn from(value: r2d2::Error) -> Self {
        InfraError(SlotflowError::Database(format!("connection pool: {value}")))
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(classify_http(&value))
    }
}

/// Shorthand for `map_err` on rusqlite results.
pub(crate) fn sql_error(err: SqlError) -> SlotflowError {
    InfraError::from(err).into()
}

// Extended result codes: SQLITE_CONSTRAINT_UNIQUE, SQLITE_CONSTRAINT_PRIMARYKEY,
// SQLITE_CONSTRAINT_FOREIGNKEY.
const UNIQUE_VIOLATION: i32 = 2067;
const PRIMARY_KEY_VIOLATION: i32 = 1555;
const FOREIGN_KEY_VIOLATION: i32 = 787;

fn classify_sqlite(err: SqlError) -> SlotflowError {
    use rusqlite::ffi::ErrorCode;

    match err {
        SqlError::SqliteFailure(failure, detail) => {
            let detail = detail.unwrap_or_default();
            match (failure.code, failure.extended_code) {
                (ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked, _) => {
                    SlotflowError::Database(format!("database busy or locked: {detail}"))
                }
                (ErrorCode::ConstraintViolation, UNIQUE_VIOLATION | PRIMARY_KEY_VIOLATION) => {
                    SlotflowError::Conflict(format!("duplicate row: {detail}"))
                }
                (ErrorCode::ConstraintViolation, FOREIGN_KEY_VIOLATION) => {
                    SlotflowError::InvalidInput(format!("unknown referenced row: {detail}"))
                }
                (code, extended) => {
                    SlotflowError::Database(format!("sqlite {code:?} ({extended}): {detail}"))
                }
            }
        }
        SqlError::QueryReturnedNoRows => SlotflowError::NotFound("row not found".into()),
        SqlError::FromSqlConversionFailure(column, _, cause) => {
            SlotflowError::Database(format!("column {column}: {cause}"))
        }
        SqlError::InvalidColumnType(column, name, ty) => {
            SlotflowError::Database(format!("column {column} ({name}) has unexpected type {ty}"))
        }
        other => SlotflowError::Database(other.to_string()),
    }
}

fn classify_http(err: &HttpError) -> SlotflowError {
    if err.is_timeout() {
        return SlotflowError::Network("notification provider timed out".into());
    }
    if err.is_connect() {
        return SlotflowError::Network("notification provider unreachable".into());
    }

    match err.status() {
        Some(status) => {
            let message = format!("HTTP {status}");
            match status.as_u16() {
                401 | 403 => SlotflowError::Unauthorized(message),
                404 => SlotflowError::NotFound(message),
                400..=499 if status.as_u16() != 429 => SlotflowError::InvalidInput(message),
                _ => SlotflowError::Network(message),
            }
        }
        None if err.is_decode() => SlotflowError::Provider(format!("unreadable response: {err}")),
        None => SlotflowError::Network(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use reqwest::{Client, StatusCode};
    use rusqlite::ffi::{Error as FfiError, ErrorCode};
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[test]
    fn sqlite_busy_maps_to_database_error() {
        let err = SqlError::SqliteFailure(
            FfiError { code: ErrorCode::DatabaseBusy, extended_code: 5 },
            Some("database is locked".into()),
        );

        let mapped = sql_error(err);
        assert!(matches!(mapped, SlotflowError::Database(ref msg) if msg.contains("busy")), "got {mapped:?}");
    }

    #[test]
    fn unique_violation_maps_to_conflict() {
        let err = SqlError::SqliteFailure(
            FfiError { code: ErrorCode::ConstraintViolation, extended_code: 2067 },
            Some("UNIQUE constraint failed: workflow_reminders.id".into()),
        );

        let mapped = sql_error(err);
        assert!(matches!(mapped, SlotflowError::Conflict(_)), "got {mapped:?}");
    }

    #[test]
    fn no_rows_maps_to_not_found() {
        let mapped = sql_error(SqlError::QueryReturnedNoRows);
        assert!(matches!(mapped, SlotflowError::NotFound(_)));
    }

    #[test]
    fn foreign_key_violation_maps_to_invalid_input() {
        let err = SqlError::SqliteFailure(
            FfiError { code: ErrorCode::ConstraintViolation, extended_code: 787 },
            None,
        );
        assert!(matches!(sql_error(err), SlotflowError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn http_status_401_maps_to_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(StatusCode::UNAUTHORIZED))
            .mount(&server)
            .await;

        let client = Client::builder().no_proxy().build().unwrap();
        let error = client.get(server.uri()).send().await.unwrap().error_for_status().unwrap_err();

        let mapped: SlotflowError = InfraError::from(error).into();
        assert!(matches!(mapped, SlotflowError::Unauthorized(ref msg) if msg.contains("401")), "got {mapped:?}");
    }
}
