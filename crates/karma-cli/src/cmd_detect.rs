use karma_core::{detect_karma_intent, KarmaIntent};

pub fn execute(text: &str, user: Option<&str>, json: bool) -> anyhow::Result<()> {
    let intent = detect_karma_intent(text, user);
    if json {
        println!("{}", serde_json::to_string_pretty(&intent)?);
    } else {
        println!("{}", describe(intent.as_ref()));
    }
    Ok(())
}

fn describe(intent: Option<&KarmaIntent>) -> String {
    let Some(intent) = intent else {
        return "No karma expression.".to_string();
    };
    let mut line = format!("target: {}\namount: {:+}", intent.target, intent.amount);
    if intent.is_buzzkill {
        line.push_str("\nbuzzkill: yes");
    }
    if intent.is_targeting_self {
        line.push_str("\nself-targeting: yes (would be refused)");
    }
    line
}
