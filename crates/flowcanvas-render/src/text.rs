use serde::{Deserialize, Serialize};
use unicode_width::UnicodeWidthStr;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TextStyle {
    pub font_size: f64,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self { font_size: 13.0 }
    }
}

impl TextStyle {
    pub fn sized(font_size: f64) -> Self {
        Self { font_size }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TextMetrics {
    pub width: f64,
    pub height: f64,
    pub line_count: usize,
}

pub trait TextMeasurer {
    fn measure(&self, text: &str, style: &TextStyle) -> TextMetrics;
}

/// Font-free measurer: every terminal column is `char_width_factor * font_size` wide.
///
/// East Asian wide characters count as two columns, so CJK titles get boxes of roughly the
/// right size without loading any font.
#[derive(Debug, Clone, Default)]
pub struct DeterministicTextMeasurer {
    pub char_width_factor: f64,
    pub line_height_factor: f64,
}

impl DeterministicTextMeasurer {
    pub fn normalized_text_lines(text: &str) -> Vec<&str> {
        text.split('\n').map(|l| l.trim_end_matches('\r')).collect()
    }

    fn factors(&self) -> (f64, f64) {
        let char_width_factor = if self.char_width_factor == 0.0 {
            0.6
        } else {
            self.char_width_factor
        };
        let line_height_factor = if self.line_height_factor == 0.0 {
            1.2
        } else {
            self.line_height_factor
        };
        (char_width_factor, line_height_factor)
    }
}

impl TextMeasurer for DeterministicTextMeasurer {
    fn measure(&self, text: &str, style: &TextStyle) -> TextMetrics {
        let (char_width_factor, line_height_factor) = self.factors();
        let lines = Self::normalized_text_lines(text);
        let font_size = style.font_size.max(1.0);
        let max_columns = lines.iter().map(|l| l.width()).max().unwrap_or(0);

        TextMetrics {
            width: max_columns as f64 * font_size * char_width_factor,
            height: lines.len() as f64 * font_size * line_height_factor,
            line_count: lines.len(),
        }
    }
}

/// Greedy word wrap into at most `max_lines` lines no wider than `max_width`.
///
/// Text that does not fit is cut and the last line ends with an ellipsis. A single word wider
/// than `max_width` is broken by characters.
pub fn wrap_text(
    measurer: &dyn TextMeasurer,
    text: &str,
    style: &TextStyle,
    max_width: f64,
    max_lines: usize,
) -> Vec<String> {
    let fits = |s: &str| measurer.measure(s, style).width <= max_width;
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{current} {word}")
        };
        if fits(&candidate) {
            current = candidate;
            continue;
        }
        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if fits(word) {
            current = word.to_string();
            continue;
        }
        for ch in word.chars() {
            current.push(ch);
            if !fits(&current) {
                current.pop();
                lines.push(std::mem::take(&mut current));
                current.push(ch);
            }
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }

    let max_lines = max_lines.max(1);
    if lines.len() > max_lines {
        lines.truncate(max_lines);
        if let Some(last) = lines.last_mut() {
            last.push('…');
            while !fits(last) && last.chars().count() > 1 {
                last.pop();
                last.pop();
                last.push('…');
            }
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wide_characters_count_double() {
        let m = DeterministicTextMeasurer::default();
        let style = TextStyle::sized(10.0);
        let ascii = m.measure("ab", &style).width;
        let cjk = m.measure("日本", &style).width;
        assert!((ascii - 12.0).abs() < 1e-9);
        assert!((cjk - 24.0).abs() < 1e-9);
    }

    #[test]
    fn wraps_on_words_and_truncates_with_ellipsis() {
        let m = DeterministicTextMeasurer::default();
        let style = TextStyle::sized(10.0);
        // 6px per column, 10 columns per line.
        let lines = wrap_text(&m, "review the signed purchase order today", &style, 61.0, 2);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "review the");
        assert!(lines[1].ends_with('…'));
        assert!(m.measure(&lines[1], &style).width <= 61.0);
    }

    #[test]
    fn long_words_are_broken() {
        let m = DeterministicTextMeasurer::default();
        let style = TextStyle::sized(10.0);
        let lines = wrap_text(&m, "abcdefghijklmno", &style, 61.0, 3);
        assert_eq!(lines, vec!["abcdefghij".to_string(), "klmno".to_string()]);
    }
}
