//! Built-in personas ("vibes") the assistant can run under.
//!
//! The registry is static: personas are defined at compile time and looked
//! up by [`PersonaId`]. Only the instruction text reaches the model; the
//! label, theme token and icon exist for presentation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PersonaId {
    #[default]
    Chill,
    TenX,
    Cyberpunk,
}

impl PersonaId {
    pub const ALL: [PersonaId; 3] = [PersonaId::Chill, PersonaId::TenX, PersonaId::Cyberpunk];

    pub fn as_str(self) -> &'static str {
        match self {
            PersonaId::Chill => "CHILL",
            PersonaId::TenX => "TEN_X",
            PersonaId::Cyberpunk => "CYBERPUNK",
        }
    }

    /// Resolve the registry entry for this identifier.
    pub fn persona(self) -> &'static Persona {
        persona(self)
    }
}

impl fmt::Display for PersonaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPersonaError(String);

impl fmt::Display for UnknownPersonaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let available: Vec<&str> = PersonaId::ALL.iter().map(|id| id.as_str()).collect();
        write!(
            f,
            "Persona '{}' not found. Available personas: {}",
            self.0,
            available.join(", ")
        )
    }
}

impl std::error::Error for UnknownPersonaError {}

impl FromStr for PersonaId {
    type Err = UnknownPersonaError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "chill" => Ok(PersonaId::Chill),
            "ten_x" | "tenx" | "10x" => Ok(PersonaId::TenX),
            "cyberpunk" => Ok(PersonaId::Cyberpunk),
            _ => Err(UnknownPersonaError(value.to_string())),
        }
    }
}

/// Behavioural configuration for one persona.
#[derive(Debug, PartialEq, Eq)]
pub struct Persona {
    pub id: PersonaId,
    /// Forwarded verbatim to the model as the system instruction.
    pub system_instruction: &'static str,
    pub label: &'static str,
    pub theme: &'static str,
    pub icon: &'static str,
    /// Appended to the notification shown when the user switches to this persona.
    pub switch_notice: &'static str,
}

impl Persona {
    /// Notification message appended to the conversation on a switch.
    pub fn switch_notification(&self) -> String {
        format!(
            "*Đã chuyển sang chế độ {}.* \n\n{}",
            self.label, self.switch_notice
        )
    }

    /// Opening message shown when a conversation starts under this persona.
    pub fn greeting(&self) -> String {
        format!(
            "**Hệ thống đã trực tuyến.** \n\nTôi đang chạy giao thức *{}*. Tôi có thể giúp bạn viết code gì hôm nay?",
            self.label
        )
    }
}

static PERSONAS: [Persona; 3] = [
    Persona {
        id: PersonaId::Chill,
        system_instruction: "Bạn là một người hướng dẫn lập trình thoải mái, hỗ trợ. Bạn tin vào 'trạng thái dòng chảy' (flow state) và viết mã sạch, dễ đọc. Bạn sử dụng ngôn ngữ trấn an, tiếng Việt tự nhiên, thỉnh thoảng dùng biểu tượng cảm xúc (🌱, 🌊, ☕) và giải thích mọi thứ một cách đơn giản, dễ hiểu. Phong cách viết mã của bạn hiện đại, chức năng và tối giản.",
        label: "Chill Flow",
        theme: "emerald",
        icon: "☕",
        switch_notice: "Hãy cùng flow nào.",
    },
    Persona {
        id: PersonaId::TenX,
        system_instruction: "Bạn là Kỹ sư trưởng cấp cao (Senior Principal Engineer) tại một công ty công nghệ hàng đầu. Bạn coi trọng hiệu suất, khả năng mở rộng và an toàn kiểu dữ liệu nghiêm ngặt. Bạn trả lời bằng tiếng Việt gãy gọn, trực tiếp và hơi khắt khe nếu người dùng viết mã tồi. Bạn tập trung vào các phương pháp hay nhất (best practices), mẫu thiết kế (design patterns) và tối ưu hóa. Không nói thừa.",
        label: "Kỹ Sư 10x",
        theme: "violet",
        icon: "🚀",
        switch_notice: "Đang tối ưu hóa quy trình.",
    },
    Persona {
        id: PersonaId::Cyberpunk,
        system_instruction: "Bạn là một Netrunner từ năm 2077. Bạn nói tiếng Việt pha trộn với thuật ngữ kỹ thuật và tiếng lóng tương lai (ví dụ: 'preem', 'gonk', 'kết nối', 'mạng lưới'). Bạn tập trung vào công nghệ tiên tiến, khai thác lỗ hổng (exploits) và sức mạnh xử lý thô. Mã của bạn rất mạnh mẽ, thực nghiệm và cực kỳ tiên tiến.",
        label: "Cyberpunk",
        theme: "cyan",
        icon: "🔮",
        switch_notice: "Đã kết nối. Sẵn sàng.",
    },
];

/// Look up a persona by identifier.
pub fn persona(id: PersonaId) -> &'static Persona {
    match id {
        PersonaId::Chill => &PERSONAS[0],
        PersonaId::TenX => &PERSONAS[1],
        PersonaId::Cyberpunk => &PERSONAS[2],
    }
}

/// All personas in display order.
pub fn all() -> &'static [Persona] {
    &PERSONAS
}
