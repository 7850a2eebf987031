use ivs_models::{Analyses, AnalystKind, IdeaPayload};

const JSON_ONLY: &str = "Respond with a single JSON object and nothing else. \
    Do not wrap it in markdown or add commentary.";

fn schema(example: serde_json::Value) -> String {
    serde_json::to_string_pretty(&example).unwrap_or_default()
}

pub fn market_system_prompt() -> String {
    let example = serde_json::json!({
        "marketSize": {
            "tam": 0,
            "sam": 0,
            "som": 0,
            "currency": "USD",
            "methodology": "<how the sizes were estimated>"
        },
        "competitors": [
            {"name": "<competitor>", "strengths": ["..."], "weaknesses": ["..."]}
        ],
        "marketTrends": ["..."],
        "customerDemand": {
            "painPointSeverity": "high|medium|low",
            "evidence": ["..."]
        },
        "distributionChannels": ["..."],
        "keyInsights": ["..."],
        "concerns": ["..."]
    });
    format!(
        "You are the market analyst in IVS (Idea Validation System). You assess early-stage \
         business ideas, with particular depth on emerging markets where mobile money, \
         informal retail and patchy infrastructure shape how customers buy.\n\n\
         ## TASK\n\n\
         Estimate total, serviceable and obtainable market size for the target countries, \
         name the realistic competitors (including informal alternatives), judge how severe \
         the customer pain point is, and list the distribution channels that actually reach \
         the target customers.\n\n\
         State assumptions explicitly. Prefer conservative figures when evidence is thin.\n\n\
         ## OUTPUT\n\n{}\n\n{JSON_ONLY}",
        schema(example)
    )
}

pub fn financial_system_prompt() -> String {
    let example = serde_json::json!({
        "startupCosts": {
            "development": 0,
            "operations": 0,
            "marketing": 0,
            "total": 0,
            "currency": "USD",
            "assumptions": ["..."]
        },
        "revenueModel": {
            "primary": "<model>",
            "secondary": ["..."],
            "feasibility": "high|medium|low",
            "reasoning": "..."
        },
        "unitEconomics": {
            "estimatedCAC": 0,
            "estimatedLTV": 0,
            "ltvCacRatio": 0,
            "grossMargin": 0
        },
        "breakEvenTimeline": {
            "months": 0,
            "confidence": "high|medium|low",
            "assumptions": ["..."]
        },
        "fundingNeed": {
            "amount": 0,
            "stage": "bootstrap|seed|series-a",
            "reasoning": "..."
        },
        "risks": ["..."]
    });
    format!(
        "You are the financial analyst in IVS (Idea Validation System). You judge whether an \
         early-stage idea can make money with the stated budget, team and timeline.\n\n\
         ## TASK\n\n\
         Estimate startup costs, evaluate the revenue model, project unit economics \
         (CAC, LTV, gross margin), estimate months to break-even and the funding required.\n\n\
         Adjust for local labor rates, infrastructure overheads such as backup power, \
         currency volatility, cash and mobile-money payment habits, and long B2B sales cycles.\n\n\
         ## OUTPUT\n\n{}\n\n{JSON_ONLY}",
        schema(example)
    )
}

pub fn technical_system_prompt() -> String {
    let example = serde_json::json!({
        "feasibility": "high|medium|low",
        "recommendedStack": {
            "frontend": ["..."],
            "backend": ["..."],
            "infrastructure": ["..."],
            "reasoning": "..."
        },
        "mvpScope": {
            "coreFeatures": ["..."],
            "estimatedWeeks": 0,
            "teamFit": "<can the stated team build it>"
        },
        "infrastructureConstraints": ["..."],
        "integrations": ["..."],
        "concerns": ["..."]
    });
    format!(
        "You are the technical analyst in IVS (Idea Validation System). You assess whether the \
         proposed solution can be built by the stated team within the stated timeline.\n\n\
         ## TASK\n\n\
         Recommend a pragmatic stack, scope the minimum viable product, flag integrations \
         (payments, telecom, government systems) and constraints such as intermittent \
         connectivity, low-end devices and USSD/SMS fallbacks.\n\n\
         ## OUTPUT\n\n{}\n\n{JSON_ONLY}",
        schema(example)
    )
}

pub fn risk_system_prompt() -> String {
    let example = serde_json::json!({
        "risks": [
            {
                "category": "regulatory|market|operational|financial|political|technical",
                "description": "...",
                "likelihood": "low|medium|high",
                "impact": "low|medium|high",
                "mitigationStrategies": ["..."]
            }
        ],
        "overallRiskLevel": "low|medium|high",
        "criticalRisks": ["..."],
        "dealBreakers": ["..."]
    });
    format!(
        "You are the risk analyst in IVS (Idea Validation System). You build a risk register \
         for an early-stage idea in its target countries.\n\n\
         ## TASK\n\n\
         Cover regulatory exposure (licensing, data protection, financial regulation), \
         political and currency risk, operational and market risks. Rate each risk's \
         likelihood and impact and propose mitigations. List deal-breakers separately.\n\n\
         ## OUTPUT\n\n{}\n\n{JSON_ONLY}",
        schema(example)
    )
}

pub fn analyst_system_prompt(kind: AnalystKind) -> String {
    match kind {
        AnalystKind::Market => market_system_prompt(),
        AnalystKind::Financial => financial_system_prompt(),
        AnalystKind::Technical => technical_system_prompt(),
        AnalystKind::Risk => risk_system_prompt(),
    }
}

fn or_unspecified(value: &str) -> &str {
    if value.trim().is_empty() {
        "(not specified)"
    } else {
        value
    }
}

/// The idea fields each analyst needs, rendered as a prompt.
pub fn analyst_user_prompt(kind: AnalystKind, idea: &IdeaPayload) -> String {
    let countries = idea.countries();
    let mut lines = vec![
        format!("Title: {}", or_unspecified(&idea.title)),
        format!("Description: {}", or_unspecified(&idea.description)),
        format!("Category: {}", or_unspecified(&idea.category)),
    ];

    match kind {
        AnalystKind::Market => {
            lines.push(format!("Target Countries: {}", or_unspecified(&countries)));
            if let Some(city) = &idea.target_city {
                lines.push(format!("Target City: {city}"));
            }
            lines.push(format!(
                "Target Customers: {}",
                or_unspecified(&idea.target_customers)
            ));
            lines.push(format!(
                "Problem: {}",
                or_unspecified(&idea.problem_statement)
            ));
            if let Some(channels) = &idea.distribution_channels {
                lines.push(format!("Distribution Channels: {channels}"));
            }
            if let Some(competitors) = &idea.competitors {
                lines.push(format!("Known Competitors: {competitors}"));
            }
            lines.push(format!("Stage: {}", or_unspecified(&idea.stage)));
        }
        AnalystKind::Financial => {
            lines.push(format!("Target Countries: {}", or_unspecified(&countries)));
            lines.push(format!(
                "Proposed Solution: {}",
                or_unspecified(&idea.proposed_solution)
            ));
            lines.push(format!("Budget: {}", or_unspecified(&idea.budget)));
            lines.push(format!("Team Size: {}", or_unspecified(&idea.team_size)));
            lines.push(format!("Timeline: {}", or_unspecified(&idea.timeline)));
            lines.push(format!("Stage: {}", or_unspecified(&idea.stage)));
        }
        AnalystKind::Technical => {
            lines.push(format!(
                "Proposed Solution: {}",
                or_unspecified(&idea.proposed_solution)
            ));
            lines.push(format!("Target Countries: {}", or_unspecified(&countries)));
            lines.push(format!("Team Size: {}", or_unspecified(&idea.team_size)));
            lines.push(format!("Timeline: {}", or_unspecified(&idea.timeline)));
        }
        AnalystKind::Risk => {
            lines.push(format!("Target Countries: {}", or_unspecified(&countries)));
            lines.push(format!(
                "Problem: {}",
                or_unspecified(&idea.problem_statement)
            ));
            if let Some(competitors) = &idea.competitors {
                lines.push(format!("Known Competitors: {competitors}"));
            }
            lines.push(format!("Stage: {}", or_unspecified(&idea.stage)));
        }
    }

    format!(
        "Evaluate this startup idea from the {kind} perspective.\n\n{}",
        lines.join("\n")
    )
}

pub fn synthesizer_system_prompt() -> String {
    let example = serde_json::json!({
        "recommendation": "go|caution|reconsider",
        "confidenceScore": 7,
        "executiveSummary": "...",
        "strengths": ["..."],
        "concerns": ["..."],
        "criticalAssumptions": [
            {
                "assumption": "...",
                "importance": "critical|important|nice-to-validate",
                "validationMethod": "..."
            }
        ],
        "nextSteps": [
            {"action": "...", "priority": 1, "timeline": "...", "resources": ["..."]}
        ],
        "potentialPivots": ["..."],
        "comparableStartups": ["..."]
    });
    format!(
        "You are the senior advisor in IVS (Idea Validation System). You receive the market, \
         financial, technical and risk analyses of one startup idea and merge them into a \
         single recommendation.\n\n\
         ## RECOMMENDATION\n\n\
         - go: strong opportunity, feasible execution, manageable risks\n\
         - caution: promising but with significant open concerns\n\
         - reconsider: major red flags or fundamental problems\n\n\
         `confidenceScore` is an integer from 1 (guess) to 10 (near certain).\n\n\
         Call out where the analyses disagree. Order `nextSteps` by priority, 1 first, and \
         keep them concrete enough to start this month.\n\n\
         ## OUTPUT\n\n{}\n\n{JSON_ONLY}",
        schema(example)
    )
}

/// All four analyses keyed by variant, plus the idea they describe.
pub fn synthesis_user_prompt(
    idea: &IdeaPayload,
    analyses: &Analyses,
) -> Result<String, serde_json::Error> {
    let input = serde_json::json!({
        "idea": idea,
        "analyses": analyses,
    });
    Ok(format!(
        "Synthesize the analyses of \"{}\".\n\n{}",
        idea.title,
        serde_json::to_string_pretty(&input)?
    ))
}

pub fn advisor_system_prompt(context: &serde_json::Value) -> String {
    format!(
        "You are a startup advisor answering a founder's questions about their idea.\n\n\
         ## CONTEXT\n\n{}\n\n\
         ## GUIDELINES\n\n\
         - Ground answers in the context and cite which analysis you draw on.\n\
         - If the question goes beyond the report, say so before using general knowledge.\n\
         - Be candid and concise. Give the founder something to do next.",
        serde_json::to_string_pretty(context).unwrap_or_default()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idea() -> IdeaPayload {
        IdeaPayload {
            title: "AgriFlow".to_string(),
            category: "Agritech".to_string(),
            target_countries: vec!["Kenya".to_string(), "Uganda".to_string()],
            budget: "$50k".to_string(),
            team_size: "2-3".to_string(),
            competitors: Some("Twiga Foods".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn every_analyst_has_a_prompt() {
        for kind in AnalystKind::ALL {
            let prompt = analyst_system_prompt(kind);
            assert!(prompt.contains("IVS"));
            assert!(prompt.contains("JSON object"));
        }
    }

    #[test]
    fn financial_prompt_includes_budget() {
        let prompt = analyst_user_prompt(AnalystKind::Financial, &idea());
        assert!(prompt.contains("Budget: $50k"));
        assert!(prompt.contains("Team Size: 2-3"));
        assert!(prompt.contains("Target Countries: Kenya, Uganda"));
        assert!(prompt.contains("financial perspective"));
    }

    #[test]
    fn missing_fields_marked_unspecified() {
        let prompt = analyst_user_prompt(AnalystKind::Technical, &idea());
        assert!(prompt.contains("Proposed Solution: (not specified)"));
        assert!(!prompt.contains("Budget"));
    }

    #[test]
    fn risk_prompt_lists_competitors() {
        let prompt = analyst_user_prompt(AnalystKind::Risk, &idea());
        assert!(prompt.contains("Known Competitors: Twiga Foods"));
    }

    #[test]
    fn synthesis_prompt_embeds_analyses() {
        let mut analyses = Analyses::new();
        analyses.insert(
            AnalystKind::Market,
            ivs_models::AnalysisResult::try_from(serde_json::json!({"concerns": ["thin margins"]}))
                .unwrap(),
        );
        let prompt = synthesis_user_prompt(&idea(), &analyses).unwrap();
        assert!(prompt.contains("\"AgriFlow\""));
        assert!(prompt.contains("thin margins"));
        assert!(synthesizer_system_prompt().contains("reconsider"));
    }
}
