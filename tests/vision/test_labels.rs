// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Class label files feeding the label aggregator

use labelsum_detect::pipeline::{AggregateError, LabelAggregator, LabelPolicy};
use labelsum_detect::vision::ClassLabelSet;
use std::io::Write;

fn label_file(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{}", content).unwrap();
    file
}

#[test]
fn test_digit_classes_sum_by_index() {
    let file = label_file("0\n1\n2\n3\n4\n5\n6\n7\n8\n9\nNULL\nJOK\n");
    let labels = ClassLabelSet::from_file(file.path()).unwrap();
    assert_eq!(labels.len(), 12);

    // Detected class indices as a detector would report them
    let detected = [5usize, 3, 10, 11, 2];
    let names: Vec<String> = detected
        .iter()
        .map(|&i| labels.label(i).into_owned())
        .collect();

    let sum = LabelAggregator::default()
        .sum(names.iter().map(String::as_str))
        .unwrap();
    assert_eq!(sum, 10);
}

#[test]
fn test_unknown_class_index_falls_back_to_number() {
    let file = label_file("NULL\nJOK\n");
    let labels = ClassLabelSet::from_file(file.path()).unwrap();

    assert_eq!(labels.label(7), "7");
    let sum = LabelAggregator::default()
        .sum([&*labels.label(0), &*labels.label(7)])
        .unwrap();
    assert_eq!(sum, 7);
}

#[test]
fn test_custom_sentinels() {
    let aggregator = LabelAggregator::new(LabelPolicy::Strict).with_sentinels(["BG"]);

    assert_eq!(aggregator.sum(["4", "BG", "6"]).unwrap(), 10);
    // NULL is no longer a sentinel, so strict parsing rejects it
    let err = aggregator.sum(["4", "NULL"]).unwrap_err();
    assert!(matches!(err, AggregateError::NotNumeric { .. }));
    assert_eq!(err.label(), "NULL");
}

#[test]
fn test_empty_label_file_is_rejected() {
    let file = label_file("\n   \n");
    assert!(ClassLabelSet::from_file(file.path()).is_err());
}
