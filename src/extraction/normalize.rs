/// Character confusions the recognizer commonly makes on odometer digits
const SUBSTITUTIONS: [(char, char); 4] = [('|', '1'), ('O', '0'), ('S', '5'), ('l', '1')];

/// Correct common OCR confusions and tidy whitespace
///
/// None of the substitution targets is itself a source, so the function is
/// idempotent.
pub fn normalize(text: &str) -> String {
    let substituted: String = text
        .chars()
        .map(|c| {
            SUBSTITUTIONS
                .iter()
                .find(|(from, _)| *from == c)
                .map_or(c, |(_, to)| *to)
        })
        .collect();

    substituted.split_whitespace().collect::<Vec<_>>().join(" ")
}
