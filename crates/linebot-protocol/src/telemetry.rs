//! 遥测行解析
//!
//! MCU 通过同一条串口链路上报 ASCII 文本行。以 `IMU:` 开头的行是遥测，
//! 负载为三个逗号分隔的有符号十进制整数 `gx,gy,gz`；其它行一律忽略。

use crate::error::ProtocolError;

/// 遥测标签
pub const TELEMETRY_TAG: &str = "IMU:";

/// 陀螺仪三轴读数
///
/// 三个字段总是作为一个整体发布，不存在逐字段更新。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TelemetrySample {
    pub gx: i32,
    pub gy: i32,
    pub gz: i32,
}

impl TelemetrySample {
    pub const fn new(gx: i32, gy: i32, gz: i32) -> Self {
        Self { gx, gy, gz }
    }

    pub fn as_tuple(&self) -> (i32, i32, i32) {
        (self.gx, self.gy, self.gz)
    }
}

/// 解析一行串口输入
///
/// # 返回
///
/// - `Ok(None)`: 不是遥测行（忽略）
/// - `Ok(Some(sample))`: 完整解析的遥测样本
/// - `Err(MalformedTelemetry)`: 带遥测标签但负载无效
pub fn parse_telemetry_line(line: &str) -> Result<Option<TelemetrySample>, ProtocolError> {
    let line = line.trim();
    let Some(payload) = line.strip_prefix(TELEMETRY_TAG) else {
        return Ok(None);
    };

    let malformed = |reason: String| ProtocolError::MalformedTelemetry {
        line: line.to_string(),
        reason,
    };

    let fields: Vec<&str> = payload.split(',').collect();
    if fields.len() != 3 {
        return Err(malformed(format!(
            "expected 3 fields, got {}",
            fields.len()
        )));
    }

    let mut values = [0i32; 3];
    for (slot, field) in values.iter_mut().zip(&fields) {
        *slot = field
            .trim()
            .parse::<i32>()
            .map_err(|e| malformed(format!("field {:?}: {}", field, e)))?;
    }

    Ok(Some(TelemetrySample::new(values[0], values[1], values[2])))
}
