use async_graphql::{InputValueError, InputValueResult, Scalar, ScalarType, Value};
use time::format_description::well_known::Rfc3339;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::{Date, OffsetDateTime};

pub mod audit;
pub mod comment;
pub mod dashboard;
pub mod event;
pub mod export;
pub mod member;
pub mod permissions;
pub mod semester;
pub mod stats;
pub mod task;
pub mod team;
pub mod template;
pub mod week;

pub const DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

#[derive(sqlx::Type, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[sqlx(transparent)]
pub struct GqlDate(pub Date);

impl GqlDate {
    pub fn parse_str(date_str: &str) -> Option<Self> {
        Date::parse(date_str, DATE_FORMAT).ok().map(GqlDate)
    }

    pub fn formatted(&self) -> String {
        self.0.format(DATE_FORMAT).unwrap_or_default()
    }
}

#[Scalar]
impl ScalarType for GqlDate {
    fn parse(value: Value) -> InputValueResult<Self> {
        if let Value::String(date_str) = &value {
            if let Some(date) = GqlDate::parse_str(date_str) {
                return Ok(date);
            }
        }

        Err(InputValueError::expected_type(value))
    }

    fn to_value(&self) -> Value {
        self.0
            .format(DATE_FORMAT)
            .map(Value::String)
            .unwrap_or_default()
    }
}

#[derive(sqlx::Type, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[sqlx(transparent)]
pub struct GqlDateTime(pub OffsetDateTime);

impl GqlDateTime {
    pub fn parse_str(date_str: &str) -> Option<Self> {
        OffsetDateTime::parse(date_str, &Rfc3339)
            .ok()
            .map(GqlDateTime)
    }

    pub fn formatted(&self) -> String {
        self.0.format(&Rfc3339).unwrap_or_default()
    }
}

impl From<OffsetDateTime> for GqlDateTime {
    fn from(time: OffsetDateTime) -> Self {
        Self(time)
    }
}

#[Scalar]
impl ScalarType for GqlDateTime {
    fn parse(value: Value) -> InputValueResult<Self> {
        if let Value::String(date_str) = &value {
            if let Some(date) = GqlDateTime::parse_str(date_str) {
                return Ok(date);
            }
        }

        Err(InputValueError::expected_type(value))
    }

    fn to_value(&self) -> Value {
        self.0
            .format(&Rfc3339)
            .map(Value::String)
            .unwrap_or_default()
    }
}
