use crate::core::config::data::Config;
use crate::core::persona;

pub fn list_personas() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let current = config.default_persona();

    println!("Available personas:\n");
    for p in persona::all() {
        let mark = if p.id == current { "*" } else { " " };
        println!("  {} {} {} - {} ({})", mark, p.icon, p.id, p.label, p.theme);
    }

    println!("\nDefault: {}", current);
    Ok(())
}
