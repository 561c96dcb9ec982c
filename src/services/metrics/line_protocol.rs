use super::types::{FieldValue, Measurement};

/// Encode one measurement as an InfluxDB line-protocol line.
pub fn encode(measurement: &Measurement) -> String {
    let mut line = escape_key(&measurement.name);

    for (key, value) in &measurement.tags {
        line.push(',');
        line.push_str(&escape_key(key));
        line.push('=');
        line.push_str(&escape_key(value));
    }

    line.push(' ');

    let fields: Vec<String> = measurement
        .fields
        .iter()
        .map(|(key, value)| format!("{}={}", escape_key(key), encode_field(value)))
        .collect();
    line.push_str(&fields.join(","));

    line.push(' ');
    line.push_str(&measurement.timestamp.timestamp_nanos_opt().unwrap_or_default().to_string());

    line
}

pub fn encode_batch(measurements: &[Measurement]) -> String {
    measurements.iter().map(encode).collect::<Vec<_>>().join("\n")
}

fn encode_field(value: &FieldValue) -> String {
    match value {
        FieldValue::Int(v) => format!("{v}i"),
        FieldValue::Float(v) => format!("{v}"),
        FieldValue::Bool(v) => v.to_string(),
        FieldValue::Str(v) => format!("\"{}\"", v.replace('"', "\\\"")),
    }
}

fn escape_key(raw: &str) -> String {
    raw.replace(' ', "\\ ").replace(',', "\\,").replace('=', "\\=")
}
