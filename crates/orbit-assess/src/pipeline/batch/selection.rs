use std::io::BufRead;

use rand::seq::SliceRandom;
use rand::Rng;

/// Reads one designation per line, skipping blanks and `#` comments.
pub fn read_designation_list<R: BufRead>(reader: R) -> std::io::Result<Vec<String>> {
    let mut designations = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let entry = line.split('#').next().unwrap_or_default().trim();
        if !entry.is_empty() {
            designations.push(entry.to_string());
        }
    }
    Ok(designations)
}

/// Picks up to `count` distinct entries, keeping their original order.
pub fn random_subset<R: Rng + ?Sized>(
    designations: &[String],
    count: usize,
    rng: &mut R,
) -> Vec<String> {
    if count >= designations.len() {
        return designations.to_vec();
    }
    let mut picked: Vec<usize> = (0..designations.len()).collect();
    picked.shuffle(rng);
    picked.truncate(count);
    picked.sort_unstable();
    picked
        .into_iter()
        .map(|index| designations[index].clone())
        .collect()
}
