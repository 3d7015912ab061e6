//! Default US futures catalogue, grouped by category.

pub const DEFAULT_SYMBOLS: &[(&str, &[&str])] = &[
    ("index", &["@ES", "@NQ", "@YM", "@RTY", "@EMD", "@SMC"]),
    ("micro_index", &["@MES", "@MNQ", "@MYM", "@M2K"]),
    ("energy", &["@CL", "@NG", "@RB", "@HO", "@BRN"]),
    ("micro_energy", &["@MCL", "@MNG"]),
    ("metals", &["@GC", "@SI", "@HG", "@PL", "@PA"]),
    ("micro_metals", &["@MGC", "@SIL", "@MHG"]),
    (
        "treasuries",
        &["@US", "@TY", "@FV", "@TU", "@UB", "@TEN", "@TWE"],
    ),
    ("grains", &["@C", "@S", "@W", "@KW", "@BO", "@SM"]),
    ("softs", &["@KC", "@SB", "@CT", "@CC", "@OJ", "@LBR"]),
    ("meats", &["@LC", "@LH", "@FC"]),
    (
        "currencies",
        &["@EC", "@JY", "@BP", "@AD", "@CD", "@SF", "@DX"],
    ),
    ("volatility", &["@VX"]),
    ("crypto", &["@BTC", "@ETH", "@MBT", "@MET"]),
];

pub fn category(name: &str) -> Option<&'static [&'static str]> {
    DEFAULT_SYMBOLS
        .iter()
        .find(|(category, _)| *category == name)
        .map(|(_, symbols)| *symbols)
}

pub fn all_symbols() -> Vec<String> {
    DEFAULT_SYMBOLS
        .iter()
        .flat_map(|(_, symbols)| symbols.iter())
        .map(|symbol| symbol.to_string())
        .collect()
}

/// clap value parser for `--category`.
pub fn parse_category(name: &str) -> Result<String, String> {
    if category(name).is_some() {
        return Ok(name.to_string());
    }
    let valid: Vec<&str> = DEFAULT_SYMBOLS.iter().map(|(category, _)| *category).collect();
    Err(format!(
        "Unknown category: '{}'. Valid categories: {}",
        name,
        valid.join(", ")
    ))
}

pub fn print_symbols() {
    println!("\nDefault US Futures Symbols");
    println!("{}", "=".repeat(50));

    for (category, symbols) in DEFAULT_SYMBOLS {
        println!("\n{}:", category.to_uppercase().replace('_', " "));
        for symbol in *symbols {
            println!("  {}", symbol);
        }
    }

    println!("\nTotal: {} symbols", all_symbols().len());
}

pub fn print_categories() {
    println!("\nAvailable Symbol Categories");
    println!("{}", "=".repeat(40));

    for (category, symbols) in DEFAULT_SYMBOLS {
        println!("  {:<15} ({} symbols)", category, symbols.len());
    }

    println!("\nUse --category <name> to download a specific category");
}
