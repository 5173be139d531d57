//! Event encoder
//!
//! Maps a [`QueryEvent`] onto the registered Avro schema and frames it in the
//! Confluent wire format:
//!
//! ```text
//! ┌──────┬──────────────────┬──────────────────────┐
//! │ 0x00 │ schema id (u32BE)│ Avro binary datum    │
//! └──────┴──────────────────┴──────────────────────┘
//! ```
//!
//! Field types and union branches are read from the schema, so a schema that
//! reorders union branches or widens `float` to `double` still encodes.

use apache_avro::schema::{RecordField, Schema};
use apache_avro::types::Value;
use apache_avro::{from_avro_datum, to_avro_datum};
use tracing::{debug, instrument};

use crate::error::{QueryError, QueryResult};
use crate::models::QueryEvent;
use crate::registry::SchemaRegistry;

pub const MAGIC_BYTE: u8 = 0x00;
pub const HEADER_LEN: usize = 5;

pub const TEXT_FIELD: &str = "msg";
pub const VECTOR_FIELD: &str = "vector";

/// Encodes query events against schemas resolved through a registry
pub struct EventEncoder<R: SchemaRegistry> {
    registry: R,
}

impl<R: SchemaRegistry> EventEncoder<R> {
    pub fn new(registry: R) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    /// Encode `event` with the latest schema of `subject`
    #[instrument(skip(self, event), fields(has_vector = event.has_vector()))]
    pub async fn encode(&self, event: &QueryEvent, subject: &str) -> QueryResult<Vec<u8>> {
        let registered = self.registry.latest(subject).await?;
        let value = event_to_value(event, &registered.schema)?;

        if !value.validate(&registered.schema) {
            return Err(QueryError::SchemaValidation(
                "event does not conform to the registered schema".to_string(),
            ));
        }

        let datum = to_avro_datum(&registered.schema, value)
            .map_err(|e| QueryError::SchemaValidation(e.to_string()))?;

        let mut framed = Vec::with_capacity(HEADER_LEN + datum.len());
        framed.push(MAGIC_BYTE);
        framed.extend_from_slice(&registered.id.to_be_bytes());
        framed.extend_from_slice(&datum);

        debug!(schema_id = registered.id, bytes = framed.len(), "Event encoded");
        Ok(framed)
    }

    /// Decode a framed payload using the schema id it carries
    pub async fn decode(&self, bytes: &[u8]) -> QueryResult<QueryEvent> {
        let schema_id = frame_schema_id(bytes)?;
        let registered = self.registry.by_id(schema_id).await?;

        let mut datum = &bytes[HEADER_LEN..];
        let value = from_avro_datum(&registered.schema, &mut datum, None)
            .map_err(|e| QueryError::Decode(e.to_string()))?;

        if !datum.is_empty() {
            return Err(QueryError::Decode(format!("{} trailing bytes after datum", datum.len())));
        }
        // A datum cut short can still parse, with the missing branches read as null
        if !value.validate(&registered.schema) {
            return Err(QueryError::Decode(format!(
                "datum does not match schema {schema_id}; payload truncated or corrupt"
            )));
        }

        value_to_event(value)
    }
}

/// Schema id from the frame header
pub fn frame_schema_id(bytes: &[u8]) -> QueryResult<u32> {
    if bytes.len() < HEADER_LEN {
        return Err(QueryError::Decode(format!(
            "frame too short: {} bytes, header needs {HEADER_LEN}",
            bytes.len()
        )));
    }
    if bytes[0] != MAGIC_BYTE {
        return Err(QueryError::Decode(format!("unknown magic byte 0x{:02x}", bytes[0])));
    }
    Ok(u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]))
}

fn record_fields(schema: &Schema) -> QueryResult<&[RecordField]> {
    match schema {
        Schema::Record(record) => Ok(&record.fields),
        other => Err(QueryError::SchemaValidation(format!(
            "registered schema is {}, expected a record",
            type_name(other)
        ))),
    }
}

fn type_name(schema: &Schema) -> &'static str {
    match schema {
        Schema::Null => "null",
        Schema::Boolean => "boolean",
        Schema::Int => "int",
        Schema::Long => "long",
        Schema::Float => "float",
        Schema::Double => "double",
        Schema::String => "string",
        Schema::Bytes => "bytes",
        Schema::Array(_) => "array",
        Schema::Map(_) => "map",
        Schema::Union(_) => "union",
        Schema::Record(_) => "record",
        Schema::Enum(_) => "enum",
        Schema::Fixed(_) => "fixed",
        _ => "an unsupported type",
    }
}

/// Wrap `present` (or null) for a field whose schema may be a nullable union
///
/// For unions the first non-null branch that accepts the value wins.
fn nullable<F>(field: &str, schema: &Schema, present: Option<F>) -> QueryResult<Value>
where
    F: Fn(&Schema) -> QueryResult<Value>,
{
    let Schema::Union(union) = schema else {
        return match present {
            Some(build) => build(schema),
            None => Err(QueryError::SchemaValidation(format!(
                "field '{field}' is absent but not nullable"
            ))),
        };
    };

    let variants = union.variants();
    let Some(build) = present else {
        return variants
            .iter()
            .position(|v| matches!(v, Schema::Null))
            .map(|idx| Value::Union(idx as u32, Box::new(Value::Null)))
            .ok_or_else(|| QueryError::SchemaValidation(format!("field '{field}' is not nullable")));
    };

    let mut first_error = None;
    for (idx, variant) in variants.iter().enumerate() {
        if matches!(variant, Schema::Null) {
            continue;
        }
        match build(variant) {
            Ok(value) => return Ok(Value::Union(idx as u32, Box::new(value))),
            Err(err) => {
                first_error.get_or_insert(err);
            }
        }
    }

    Err(first_error.unwrap_or_else(|| {
        QueryError::SchemaValidation(format!("field '{field}' has no non-null branch"))
    }))
}

fn text_value(text: &str, schema: &Schema) -> QueryResult<Value> {
    match schema {
        Schema::String => Ok(Value::String(text.to_string())),
        other => Err(QueryError::SchemaValidation(format!(
            "field '{TEXT_FIELD}' is {}, expected string",
            type_name(other)
        ))),
    }
}

fn vector_value(vector: &[f32], schema: &Schema) -> QueryResult<Value> {
    let Schema::Array(array) = schema else {
        return Err(QueryError::SchemaValidation(format!(
            "field '{VECTOR_FIELD}' is {}, expected array",
            type_name(schema)
        )));
    };

    vector
        .iter()
        .map(|&component| nullable(VECTOR_FIELD, &array.items, Some(|s: &Schema| float_value(component, s))))
        .collect::<QueryResult<Vec<_>>>()
        .map(Value::Array)
}

fn float_value(component: f32, schema: &Schema) -> QueryResult<Value> {
    match schema {
        Schema::Float => Ok(Value::Float(component)),
        Schema::Double => Ok(Value::Double(f64::from(component))),
        other => Err(QueryError::SchemaValidation(format!(
            "items of '{VECTOR_FIELD}' are {}, expected float",
            type_name(other)
        ))),
    }
}

/// Build the Avro record for `event`; unknown schema fields must be nullable
fn event_to_value(event: &QueryEvent, schema: &Schema) -> QueryResult<Value> {
    let fields = record_fields(schema)?;

    for required in [TEXT_FIELD, VECTOR_FIELD] {
        if !fields.iter().any(|f| f.name == required) {
            return Err(QueryError::SchemaValidation(format!(
                "registered schema has no '{required}' field"
            )));
        }
    }

    let values = fields
        .iter()
        .map(|field| {
            let value = match field.name.as_str() {
                TEXT_FIELD => nullable(
                    TEXT_FIELD,
                    &field.schema,
                    event.text.as_deref().map(|text| move |s: &Schema| text_value(text, s)),
                ),
                VECTOR_FIELD => nullable(
                    VECTOR_FIELD,
                    &field.schema,
                    event.vector.as_deref().map(|v| move |s: &Schema| vector_value(v, s)),
                ),
                other => nullable(other, &field.schema, None::<fn(&Schema) -> QueryResult<Value>>),
            }?;
            Ok((field.name.clone(), value))
        })
        .collect::<QueryResult<Vec<_>>>()?;

    Ok(Value::Record(values))
}

fn unwrap_union(value: Value) -> Value {
    match value {
        Value::Union(_, inner) => *inner,
        other => other,
    }
}

fn value_to_event(value: Value) -> QueryResult<QueryEvent> {
    let Value::Record(fields) = value else {
        return Err(QueryError::Decode("datum is not a record".to_string()));
    };

    let mut event = QueryEvent::default();
    for (name, value) in fields {
        match (name.as_str(), unwrap_union(value)) {
            (_, Value::Null) => {}
            (TEXT_FIELD, Value::String(text)) => event.text = Some(text),
            (VECTOR_FIELD, Value::Array(items)) => {
                let vector = items
                    .into_iter()
                    .map(|item| match unwrap_union(item) {
                        Value::Float(f) => Ok(f),
                        Value::Double(d) => Ok(d as f32),
                        other => Err(QueryError::Decode(format!("unexpected vector component {other:?}"))),
                    })
                    .collect::<QueryResult<Vec<f32>>>()?;
                event.vector = Some(vector);
            }
            (TEXT_FIELD | VECTOR_FIELD, other) => {
                return Err(QueryError::Decode(format!("unexpected value for '{name}': {other:?}")));
            }
            _ => {}
        }
    }
    Ok(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{MockSchemaRegistry, StaticSchemaRegistry, USER_QUERY_SCHEMA};

    const SUBJECT: &str = "user_query-value";

    fn encoder() -> EventEncoder<StaticSchemaRegistry> {
        EventEncoder::new(StaticSchemaRegistry::user_queries(SUBJECT, 100042).unwrap())
    }

    #[tokio::test]
    async fn test_round_trip_with_vector() {
        let encoder = encoder();
        let event = QueryEvent::new("pump overheating", Some(vec![0.25, -1.5, 3.0e-7]));

        let bytes = encoder.encode(&event, SUBJECT).await.unwrap();

        assert_eq!(bytes[0], MAGIC_BYTE);
        assert_eq!(frame_schema_id(&bytes).unwrap(), 100042);
        assert_eq!(encoder.decode(&bytes).await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_null_vector_round_trip() {
        let encoder = encoder();
        let event = QueryEvent::text_only("pump overheating");

        let bytes = encoder.encode(&event, SUBJECT).await.unwrap();
        let decoded = encoder.decode(&bytes).await.unwrap();

        assert_eq!(decoded.text.as_deref(), Some("pump overheating"));
        assert_eq!(decoded.vector, None);
    }

    #[tokio::test]
    async fn test_empty_event_round_trip() {
        let encoder = encoder();
        let bytes = encoder.encode(&QueryEvent::default(), SUBJECT).await.unwrap();

        // header + two null-branch union indexes
        assert_eq!(bytes.len(), HEADER_LEN + 2);
        assert_eq!(encoder.decode(&bytes).await.unwrap(), QueryEvent::default());
    }

    #[tokio::test]
    async fn test_wire_layout_of_null_vector() {
        let encoder = encoder();
        let bytes = encoder.encode(&QueryEvent::text_only("hi"), SUBJECT).await.unwrap();

        // union branch 1 (zigzag 0x02), length 2 (0x04), "hi", union branch 0
        assert_eq!(&bytes[HEADER_LEN..], &[0x02, 0x04, b'h', b'i', 0x00]);
    }

    #[tokio::test]
    async fn test_reordered_union_and_double_items() {
        let schema = r#"{
          "type": "record", "name": "q",
          "fields": [
            { "name": "vector", "type": [{ "type": "array", "items": "double" }, "null"] },
            { "name": "msg", "type": ["string", "null"] },
            { "name": "session", "type": ["null", "string"], "default": null }
          ]
        }"#;
        let encoder = EventEncoder::new(StaticSchemaRegistry::new().with_schema(SUBJECT, 3, schema).unwrap());
        let event = QueryEvent::new("reorder", Some(vec![0.5, 2.0]));

        let bytes = encoder.encode(&event, SUBJECT).await.unwrap();
        assert_eq!(encoder.decode(&bytes).await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_wrong_field_type_is_schema_violation() {
        let schema = r#"{
          "type": "record", "name": "q",
          "fields": [
            { "name": "msg", "type": ["null", "int"] },
            { "name": "vector", "type": ["null", { "type": "array", "items": "float" }] }
          ]
        }"#;
        let encoder = EventEncoder::new(StaticSchemaRegistry::new().with_schema(SUBJECT, 1, schema).unwrap());

        let err = encoder.encode(&QueryEvent::text_only("x"), SUBJECT).await.unwrap_err();
        assert!(matches!(err, QueryError::SchemaValidation(msg) if msg.contains("msg")));
    }

    #[tokio::test]
    async fn test_absent_non_nullable_field_is_schema_violation() {
        let schema = r#"{
          "type": "record", "name": "q",
          "fields": [
            { "name": "msg", "type": "string" },
            { "name": "vector", "type": ["null", { "type": "array", "items": "float" }] }
          ]
        }"#;
        let encoder = EventEncoder::new(StaticSchemaRegistry::new().with_schema(SUBJECT, 1, schema).unwrap());

        let err = encoder
            .encode(&QueryEvent { text: None, vector: Some(vec![1.0]) }, SUBJECT)
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::SchemaValidation(_)));
    }

    #[tokio::test]
    async fn test_registry_failure_is_propagated() {
        let mut registry = MockSchemaRegistry::new();
        registry
            .expect_latest()
            .returning(|_| Err(QueryError::Registry("unreachable".into())));

        let err = EventEncoder::new(registry)
            .encode(&QueryEvent::text_only("x"), SUBJECT)
            .await
            .unwrap_err();
        assert_eq!(err, QueryError::Registry("unreachable".into()));
    }

    #[tokio::test]
    async fn test_malformed_frames() {
        let encoder = encoder();

        assert!(matches!(encoder.decode(&[0x00, 0x01]).await, Err(QueryError::Decode(_))));
        assert!(matches!(
            encoder.decode(&[0x01, 0, 1, 0x86, 0x9a, 0x00, 0x00]).await,
            Err(QueryError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn test_truncated_payload_is_decode_error() {
        let encoder = encoder();
        let bytes = encoder.encode(&QueryEvent::text_only("hello"), SUBJECT).await.unwrap();
        assert_eq!(bytes, [0, 0, 1, 0x86, 0xca, 2, 10, b'h', b'e', b'l', b'l', b'o', 0]);

        for cut in 1..=bytes.len() - HEADER_LEN {
            let truncated = &bytes[..bytes.len() - cut];
            assert!(
                matches!(encoder.decode(truncated).await, Err(QueryError::Decode(_))),
                "payload with {cut} bytes removed decoded without error"
            );
        }
    }

    #[tokio::test]
    async fn test_unknown_schema_id_is_registry_error() {
        let encoder = encoder();
        let err = encoder.decode(&[0x00, 0, 0, 0, 9, 0x00, 0x00]).await.unwrap_err();
        assert!(matches!(err, QueryError::Registry(_)));
    }

    #[test]
    fn test_default_schema_parses() {
        let schema = Schema::parse_str(USER_QUERY_SCHEMA).unwrap();
        let fields = record_fields(&schema).unwrap();
        let names: Vec<_> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec![TEXT_FIELD, VECTOR_FIELD]);
    }
}
