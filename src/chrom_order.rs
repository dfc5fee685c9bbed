//! Chromosome label ordering
//!
//! Chromosomes are ordered by the integer formed from all digits in the label, so that
//! "chr2" sorts before "chr10". Labels with no digits can't be placed in this order.
//!

use regex::Regex;
use simple_error::{SimpleResult, bail};

/// Extract the numeric ordering key from a chromosome label
///
/// All digit runs in the label are concatenated, e.g. "chr12" -> 12, "1p2" -> 12
///
fn get_chrom_order_key(digit_regex: &Regex, chrom_label: &str) -> SimpleResult<u64> {
    let digits = digit_regex
        .find_iter(chrom_label)
        .map(|x| x.as_str())
        .collect::<String>();
    if digits.is_empty() {
        bail!("Chromosome label '{chrom_label}' contains no digits and can't be ordered");
    }
    match digits.parse::<u64>() {
        Ok(x) => Ok(x),
        Err(_) => bail!("Chromosome label '{chrom_label}' has an out of range numeric component"),
    }
}

/// Sort chromosome labels by numeric ordering key
///
/// Labels with the same key are ordered lexicographically so that the result does not depend on
/// input order.
///
pub fn sort_chrom_labels<'a>(
    chrom_labels: impl IntoIterator<Item = &'a str>,
) -> SimpleResult<Vec<String>> {
    let digit_regex = Regex::new(r"\d+").unwrap();
    let mut keyed_labels = Vec::new();
    for chrom_label in chrom_labels {
        let key = get_chrom_order_key(&digit_regex, chrom_label)?;
        keyed_labels.push((key, chrom_label.to_string()));
    }
    keyed_labels.sort();
    keyed_labels.dedup();
    Ok(keyed_labels.into_iter().map(|(_, x)| x).collect())
}
