//! Factories for generated domain values.

use std::sync::Mutex;

use uuid::Uuid;

use super::value_object::{SESSION_CODE_LEN, SessionCode};

/// Source of candidate short codes.
///
/// Candidates need not be unique; the store's uniqueness constraint is the authority
/// and callers retry on conflict.
pub trait CodeGenerator: Send + Sync {
    fn generate(&self) -> SessionCode;
}

/// Generates codes from the leading hex digits of a random UUID, uppercased.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomCodeGenerator;

impl CodeGenerator for RandomCodeGenerator {
    fn generate(&self) -> SessionCode {
        let hex = Uuid::new_v4().simple().to_string();
        SessionCode::new(hex[..SESSION_CODE_LEN].to_string())
            .unwrap_or_else(|_| unreachable!("uuid hex digits always form a valid code"))
    }
}

/// Replays a fixed list of codes, repeating the last one when exhausted.
#[derive(Debug)]
pub struct SequenceCodeGenerator {
    codes: Vec<SessionCode>,
    cursor: Mutex<usize>,
}

impl SequenceCodeGenerator {
    /// # Panics
    ///
    /// Panics if `codes` is empty.
    pub fn new(codes: Vec<SessionCode>) -> Self {
        assert!(!codes.is_empty(), "SequenceCodeGenerator needs at least one code");
        Self {
            codes,
            cursor: Mutex::new(0),
        }
    }
}

impl CodeGenerator for SequenceCodeGenerator {
    fn generate(&self) -> SessionCode {
        let mut cursor = self
            .cursor
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let index = (*cursor).min(self.codes.len() - 1);
        *cursor += 1;
        self.codes[index].clone()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_random_codes_have_expected_shape() {
        // テスト項目: 生成されたコードが 8 文字の大文字英数字である
        // given (前提条件):
        let generator = RandomCodeGenerator;

        // when (操作):
        let code = generator.generate();

        // then (期待する結果):
        assert_eq!(code.as_str().len(), SESSION_CODE_LEN);
        assert!(
            code.as_str()
                .chars()
                .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase())
        );
    }

    #[test]
    fn test_random_codes_rarely_repeat() {
        // テスト項目: 連続生成したコードがほぼ重複しない
        // given (前提条件):
        let generator = RandomCodeGenerator;

        // when (操作):
        let codes: HashSet<String> = (0..1000)
            .map(|_| generator.generate().into_string())
            .collect();

        // then (期待する結果): 32bit 空間なので 1000 件では実質衝突しない
        assert!(codes.len() >= 999);
    }

    #[test]
    fn test_sequence_generator_repeats_last_code() {
        // テスト項目: SequenceCodeGenerator は使い切った後に最後のコードを返し続ける
        // given (前提条件):
        let a = SessionCode::new("AAAAAAAA".to_string()).unwrap();
        let b = SessionCode::new("BBBBBBBB".to_string()).unwrap();
        let generator = SequenceCodeGenerator::new(vec![a.clone(), b.clone()]);

        // when (操作):
        let generated: Vec<SessionCode> = (0..4).map(|_| generator.generate()).collect();

        // then (期待する結果):
        assert_eq!(generated, vec![a, b.clone(), b.clone(), b]);
    }
}
