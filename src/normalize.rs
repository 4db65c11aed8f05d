//! Raw kline → [`KlineRecord`] mapping

use serde_json::Value;

use crate::error::{ExportError, ExportResult};
use crate::timestamp::format_datetime;
use crate::types::{field, KlineRecord, RawKline};

/// Map one raw kline to its exported shape.
///
/// Open and close times become local `YYYY-MM-DD HH:MM:SS` strings; every other
/// field is copied as received. Missing fields and unusable timestamps are
/// reported as [`ExportError::MalformedRecord`].
pub fn normalize(raw: &RawKline) -> ExportResult<KlineRecord> {
    let open_time = millis_at(raw, field::OPEN_TIME, "open time")?;
    let close_time = millis_at(raw, field::CLOSE_TIME, "close time")?;

    Ok(KlineRecord {
        open_time,
        date: render(open_time, "open time")?,
        open: value_at(raw, field::OPEN, "open")?,
        high: value_at(raw, field::HIGH, "high")?,
        low: value_at(raw, field::LOW, "low")?,
        close: value_at(raw, field::CLOSE, "close")?,
        volume: value_at(raw, field::VOLUME, "volume")?,
        close_time: render(close_time, "close time")?,
        quote_asset_volume: value_at(raw, field::QUOTE_ASSET_VOLUME, "quote asset volume")?,
        number_of_trades: value_at(raw, field::NUMBER_OF_TRADES, "number of trades")?,
        taker_buy_base_asset_volume: value_at(
            raw,
            field::TAKER_BUY_BASE_ASSET_VOLUME,
            "taker buy base asset volume",
        )?,
        taker_buy_quote_asset_volume: value_at(
            raw,
            field::TAKER_BUY_QUOTE_ASSET_VOLUME,
            "taker buy quote asset volume",
        )?,
    })
}

fn value_at(raw: &RawKline, index: usize, name: &str) -> ExportResult<Value> {
    raw.get(index).cloned().ok_or_else(|| {
        ExportError::MalformedRecord(format!(
            "missing {} (field {}) in kline with {} of {} fields",
            name,
            index,
            raw.0.len(),
            field::COUNT
        ))
    })
}

fn millis_at(raw: &RawKline, index: usize, name: &str) -> ExportResult<i64> {
    let value = value_at(raw, index, name)?;
    value.as_i64().ok_or_else(|| {
        ExportError::MalformedRecord(format!("{} is not an epoch-ms integer: {}", name, value))
    })
}

fn render(millis: i64, name: &str) -> ExportResult<String> {
    format_datetime(millis).ok_or_else(|| {
        ExportError::MalformedRecord(format!("{} {} is out of range", name, millis))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> RawKline {
        serde_json::from_value(json!([
            1_502_928_000_000_i64,
            "4261.48000000",
            "4485.39000000",
            "4200.74000000",
            "4285.08000000",
            "795.15037700",
            1_503_014_399_999_i64,
            "3454770.05073206",
            3427,
            "616.24854100",
            "2678216.40060401",
            "0"
        ]))
        .unwrap()
    }

    #[test]
    fn test_fields_map_by_position() {
        let record = normalize(&sample()).unwrap();

        assert_eq!(record.open_time, 1_502_928_000_000);
        assert_eq!(record.date, format_datetime(1_502_928_000_000).unwrap());
        assert_eq!(record.close_time, format_datetime(1_503_014_399_999).unwrap());
        assert_eq!(record.open, json!("4261.48000000"));
        assert_eq!(record.high, json!("4485.39000000"));
        assert_eq!(record.low, json!("4200.74000000"));
        assert_eq!(record.close, json!("4285.08000000"));
        assert_eq!(record.volume, json!("795.15037700"));
        assert_eq!(record.quote_asset_volume, json!("3454770.05073206"));
        assert_eq!(record.number_of_trades, json!(3427));
        assert_eq!(record.taker_buy_base_asset_volume, json!("616.24854100"));
        assert_eq!(record.taker_buy_quote_asset_volume, json!("2678216.40060401"));
    }

    #[test]
    fn test_normalize_is_pure() {
        let raw = sample();
        assert_eq!(normalize(&raw).unwrap(), normalize(&raw).unwrap());
    }

    #[test]
    fn test_serialized_keys_and_order() {
        let value = serde_json::to_value(normalize(&sample()).unwrap()).unwrap();
        let mut keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();

        let mut expected = vec![
            "date",
            "open",
            "high",
            "low",
            "close",
            "volume",
            "close_time",
            "quote_asset_volume",
            "number_of_trades",
            "taker_buy_base_asset_volume",
            "taker_buy_quote_asset_volume",
        ];
        // serde_json::Map is sorted without the preserve_order feature
        expected.sort_unstable();
        keys.sort_unstable();
        assert_eq!(keys, expected);

        let text = serde_json::to_string(&normalize(&sample()).unwrap()).unwrap();
        assert!(text.starts_with("{\"date\":"));
        assert!(!text.contains("open_time"));
    }

    #[test]
    fn test_missing_field_is_malformed() {
        let mut raw = sample();
        raw.0.truncate(9);

        match normalize(&raw) {
            Err(ExportError::MalformedRecord(msg)) => {
                assert!(msg.contains("taker buy base asset volume"), "{}", msg)
            }
            other => panic!("expected MalformedRecord, got {:?}", other),
        }
    }

    #[test]
    fn test_non_integer_time_is_malformed() {
        let mut raw = sample();
        raw.0[0] = json!("1502928000000");
        assert!(matches!(normalize(&raw), Err(ExportError::MalformedRecord(_))));
    }

    #[test]
    fn test_extra_fields_are_ignored() {
        // the sample already carries Binance's trailing "ignore" field
        assert_eq!(sample().0.len(), 12);
        assert!(normalize(&sample()).is_ok());
    }
}
