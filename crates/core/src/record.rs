//! 레코드 타입 — 발행 대상 로그 라인과 부가 속성

use serde::de::{Deserialize, Deserializer, Error as DeError};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};

/// 레코드 직렬화 시 원본 라인이 들어가는 예약 키
///
/// 필터 규칙의 속성 키로는 사용할 수 없습니다.
pub const RESERVED_LINE_KEY: &str = "string";

/// 브로커로 발행되는 단위 레코드
///
/// 원본 로그 라인 하나와, 그 라인을 채택한 필터 규칙이 부여한
/// 속성 집합으로 구성됩니다. JSON 직렬화 시 라인은 `"string"` 키로,
/// 속성은 같은 레벨에 평탄화되어 들어갑니다:
///
/// ```json
/// {"string": "GET /health 200", "severity": "info", "source": "nginx"}
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// 원본 로그 라인 (종결자 제외)
    pub line: String,
    /// 채택 규칙이 부여한 속성 (키 `"string"`은 금지)
    pub attributes: Map<String, Value>,
}

impl Record {
    /// 속성 없는 레코드를 생성합니다.
    pub fn new(line: impl Into<String>) -> Self {
        Self {
            line: line.into(),
            attributes: Map::new(),
        }
    }

    /// 라인과 속성으로 레코드를 생성합니다.
    pub fn with_attributes(line: impl Into<String>, attributes: Map<String, Value>) -> Self {
        Self {
            line: line.into(),
            attributes,
        }
    }

    /// 와이어 포맷 JSON 문자열로 직렬화합니다.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// 와이어 포맷과 동일한 구조의 `serde_json::Value`를 만듭니다.
    ///
    /// AMQP 헤더처럼 메시지 본문을 그대로 비추는 자리에 사용합니다.
    pub fn to_value(&self) -> Value {
        let mut map = Map::with_capacity(1 + self.attributes.len());
        map.insert(RESERVED_LINE_KEY.to_owned(), Value::String(self.line.clone()));
        for (key, value) in &self.attributes {
            map.insert(key.clone(), value.clone());
        }
        Value::Object(map)
    }
}

impl Serialize for Record {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(1 + self.attributes.len()))?;
        map.serialize_entry(RESERVED_LINE_KEY, &self.line)?;
        for (key, value) in &self.attributes {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let mut map = Map::deserialize(deserializer)?;
        let line = match map.remove(RESERVED_LINE_KEY) {
            Some(Value::String(line)) => line,
            Some(_) => {
                return Err(D::Error::custom(format!(
                    "\"{RESERVED_LINE_KEY}\" must be a JSON string"
                )));
            }
            None => return Err(D::Error::missing_field(RESERVED_LINE_KEY)),
        };
        Ok(Self {
            line,
            attributes: map,
        })
    }
}
