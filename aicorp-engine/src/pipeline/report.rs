//! Printable HTML report for a pipeline.

use std::fmt::Write;

use chrono::Utc;

use super::stage::ProductPipeline;
use crate::format::{escape_html, strip_think};

const STYLE: &str = r#"body { font-family: 'Segoe UI', Arial, sans-serif; max-width: 800px; margin: 0 auto; padding: 40px; line-height: 1.6; }
h1 { color: #1a365d; border-bottom: 3px solid #3182ce; padding-bottom: 10px; }
h2 { color: #2c5282; margin-top: 30px; border-bottom: 1px solid #bee3f8; padding-bottom: 5px; }
h3 { color: #2b6cb0; }
.header { text-align: center; margin-bottom: 40px; }
.company { font-size: 24px; font-weight: bold; color: #2b6cb0; }
.meta { color: #718096; font-size: 14px; margin: 10px 0; }
.section { margin: 20px 0; padding: 15px; background: #f7fafc; border-radius: 8px; }
.highlight { background: #ebf8ff; padding: 15px; border-left: 4px solid #3182ce; margin: 15px 0; }
.phase { background: #fff; border: 1px solid #e2e8f0; border-radius: 8px; padding: 20px; margin: 15px 0; }
.phase-title { font-size: 18px; font-weight: bold; color: #2d3748; }
.phase-duration { background: #bee3f8; color: #2c5282; padding: 4px 12px; border-radius: 20px; font-size: 12px; }
.kpi { display: inline-block; background: #c6f6d5; color: #276749; padding: 4px 12px; border-radius: 4px; margin: 4px; font-size: 13px; }
.milestone { padding: 10px; background: #feebc8; border-radius: 4px; margin: 8px 0; }
.footer { margin-top: 50px; padding-top: 20px; border-top: 1px solid #e2e8f0; color: #718096; font-size: 12px; text-align: center; }
@media print { body { padding: 20px; } .section { break-inside: avoid; } }"#;

/// Escaped, think-free text with paragraph and line breaks as HTML.
fn paragraphs(text: &str) -> String {
    escape_html(strip_think(text).trim())
        .replace("\n\n", "</p><p>")
        .replace('\n', "<br>")
}

fn section(out: &mut String, title: &str, body: &str) {
    if body.trim().is_empty() {
        return;
    }
    let _ = write!(
        out,
        "<div class=\"section\"><h3>{}</h3><p>{}</p></div>\n",
        escape_html(title),
        paragraphs(body)
    );
}

fn list(out: &mut String, label: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    let _ = write!(out, "<strong>{label}:</strong><ul>");
    for item in items {
        let _ = write!(out, "<li>{}</li>", escape_html(item));
    }
    out.push_str("</ul>");
}

/// Render `pipeline` as a standalone HTML document.
pub fn render_html(pipeline: &ProductPipeline, company: &str) -> String {
    let name = escape_html(&pipeline.name);
    let mut out = String::with_capacity(8 * 1024);
    let _ = write!(
        out,
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"UTF-8\">\n<title>{name} - Business Execution Plan</title>\n<style>\n{STYLE}\n</style>\n</head>\n<body>\n\
         <div class=\"header\">\n<div class=\"company\">{}</div>\n<h1>{name}</h1>\n<p class=\"meta\">Business Execution Plan</p>\n\
         <p class=\"meta\">Generated: {}</p>\n<p class=\"meta\">Stage: {}</p>\n</div>\n",
        escape_html(company),
        Utc::now().format("%B %-d, %Y"),
        pipeline.stage,
    );

    if let Some(idea) = &pipeline.idea {
        let _ = write!(
            out,
            "<h2>Executive Summary</h2>\n<div class=\"section\">\n<h3>The Problem</h3><p>{}</p>\n<h3>Our Solution</h3><p>{}</p>\n\
             <div class=\"highlight\"><strong>Value Proposition:</strong> {}</div>\n\
             <h3>Target Customer</h3><p>{}</p>\n<h3>Revenue Model</h3><p>{}</p>\n</div>\n",
            paragraphs(&idea.problem),
            paragraphs(&idea.solution),
            paragraphs(&idea.value_prop),
            paragraphs(&idea.target_customer),
            paragraphs(&idea.revenue_model),
        );
    }

    if let Some(packet) = &pipeline.work_packet {
        out.push_str("<h2>Research &amp; Analysis</h2>\n");
        section(&mut out, "Market Research", &packet.market_research);
        section(&mut out, "Competitive Analysis", &packet.competitive_analysis);
        section(&mut out, "Financial Projections", &packet.financial_projections);
        section(&mut out, "Marketing Strategy", &packet.marketing_strategy);
        section(&mut out, "Business Plan", &packet.business_plan);
    }

    if let Some(review) = &pipeline.csuite_review {
        out.push_str("<h2>Executive Review</h2>\n<div class=\"section\">");
        let _ = write!(
            out,
            "<p><strong>Decision:</strong> {}</p><p>{}</p>",
            if review.approved { "Approved" } else { "Needs work" },
            paragraphs(&review.feedback)
        );
        list(&mut out, "Concerns", &review.concerns);
        list(&mut out, "Suggestions", &review.suggestions);
        out.push_str("</div>\n");
    }

    if let Some(plan) = &pipeline.execution_plan {
        let _ = write!(
            out,
            "<h2>Execution Plan</h2>\n<div class=\"highlight\"><strong>Timeline:</strong> {}<br><strong>Budget:</strong> {}</div>\n",
            escape_html(&plan.timeline),
            escape_html(&plan.budget)
        );
        section(&mut out, "Team Structure", &plan.team_structure);
        if !plan.kpis.is_empty() {
            out.push_str("<h3>Key Performance Indicators</h3><div class=\"section\">");
            for kpi in &plan.kpis {
                let _ = write!(out, "<span class=\"kpi\">{}</span>", escape_html(kpi));
            }
            out.push_str("</div>\n");
        }
        if !plan.milestones.is_empty() {
            out.push_str("<h3>Milestones</h3><div class=\"section\">");
            for m in &plan.milestones {
                let _ = write!(out, "<div class=\"milestone\">{}</div>", escape_html(m));
            }
            out.push_str("</div>\n");
        }
        if !plan.phases.is_empty() {
            out.push_str("<h3>Implementation Phases</h3>\n");
            for (i, phase) in plan.phases.iter().enumerate() {
                let _ = write!(
                    out,
                    "<div class=\"phase\"><span class=\"phase-title\">Phase {}: {}</span> <span class=\"phase-duration\">{}</span><p>{}</p>",
                    i + 1,
                    escape_html(&phase.name),
                    escape_html(&phase.duration),
                    paragraphs(&phase.description)
                );
                list(&mut out, "Tasks", &phase.tasks);
                list(&mut out, "Deliverables", &phase.deliverables);
                out.push_str("</div>\n");
            }
        }
        section(&mut out, "Risk Mitigation", &plan.risk_mitigation);
    }

    if let Some(decision) = &pipeline.board_decision {
        let _ = write!(
            out,
            "<h2>Board Decision</h2>\n<div class=\"section\"><p><strong>Status:</strong> {}</p>\
             <p><strong>Votes For:</strong> {} | <strong>Against:</strong> {} | <strong>Abstentions:</strong> {}</p></div>\n",
            if decision.approved { "Approved" } else { "Rejected" },
            decision.votes_for,
            decision.votes_against,
            decision.abstentions
        );
    }

    let _ = write!(
        out,
        "<div class=\"footer\"><p>Generated by the AI company pipeline</p><p>Pipeline ID: {}</p>\
         <p>This document is auto-generated and should be reviewed by human stakeholders before execution.</p></div>\n</body>\n</html>\n",
        pipeline.id
    );
    out
}
