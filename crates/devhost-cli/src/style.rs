use console::Emoji;

pub static CHECK: Emoji<'_, '_> = Emoji("✅", "v");
pub static CROSS: Emoji<'_, '_> = Emoji("❌", "x");
pub static WARN: Emoji<'_, '_> = Emoji("⚠", "!");
pub static DOT: Emoji<'_, '_> = Emoji("•", "-");
