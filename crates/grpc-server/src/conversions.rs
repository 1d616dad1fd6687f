//! Conversions between core result types and proto messages

use mt5_bridge_core::NumericSeries;

use crate::proto;

/// Encode a numeric buffer for the wire. An absent native result becomes
/// the empty-payload descriptor (no data, no dtype, no shape), never a
/// missing message.
pub fn series_to_proto(series: Option<NumericSeries>) -> proto::NumericArray {
    match series {
        Some(series) => proto::NumericArray {
            data: series.data,
            dtype: series.dtype,
            shape: series.shape,
        },
        None => proto::NumericArray::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_series_encodes_as_empty_descriptor() {
        let array = series_to_proto(None);
        assert!(array.data.is_empty());
        assert!(array.dtype.is_empty());
        assert!(array.shape.is_empty());
    }

    #[test]
    fn present_series_copies_all_parts() {
        let array = series_to_proto(Some(NumericSeries {
            data: vec![1, 2, 3, 4],
            dtype: "float64".to_string(),
            shape: vec![2, 2],
        }));
        assert_eq!(array.data, vec![1, 2, 3, 4]);
        assert_eq!(array.dtype, "float64");
        assert_eq!(array.shape, vec![2, 2]);
    }
}
