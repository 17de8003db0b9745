/*
 * MSK Migrator (C) 2024 - 2025 Parseable, Inc.
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as
 * published by the Free Software Foundation, either version 3 of the
 * License, or (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program.  If not, see <http://www.gnu.org/licenses/>.
 *
 */

use crossterm::style::Stylize;

use crate::about;
use crate::confluent::PushSummary;
use crate::migrate::MigrationSummary;

pub fn print_start(apply: bool, dry_run: bool) {
    let mode = match (apply, dry_run) {
        (false, _) => "extract only".to_string().grey(),
        (true, true) => "apply (dry run)".to_string().yellow(),
        (true, false) => "apply".to_string().green(),
    };

    eprintln!(
        "
    {} {}
        Build:              \"{}\"
        Mode:               \"{}\"",
        "MSK Migrator".to_string().bold(),
        about::version_string(),
        about::build_timestamp(),
        mode
    );
}

pub fn print_summary(summary: &MigrationSummary) {
    eprintln!(
        "
    {}
        Output:             \"{}\"
        Topics:             {}
        Consumer Groups:    {} ({} inactive)
        Schemas:            {}
        ACLs:               {}
        Role Bindings:      {}
        Service Accounts:   {}",
        "Extracted:".to_string().bold(),
        summary.output_dir.display(),
        summary.topics,
        summary.consumer_groups,
        summary.inactive_consumer_groups,
        summary.schemas,
        summary.acls,
        summary.role_bindings,
        summary.service_accounts,
    );

    if summary.notes > 0 {
        eprintln!(
            "{:8}Notes:              {}",
            "",
            format!("{} (see the conversion report)", summary.notes).yellow()
        );
    }

    if summary.pushes.is_empty() {
        eprintln!();
        return;
    }

    eprintln!("\n    {}", "Pushed to Confluent Cloud:".to_string().bold());
    for (name, push) in &summary.pushes {
        eprintln!("{:8}{:<20}{}", "", format!("{name}:"), push_line(push));
    }
    eprintln!();
}

fn push_line(push: &PushSummary) -> String {
    let failed = if push.failed > 0 {
        format!("{} failed", push.failed).red().to_string()
    } else {
        "0 failed".to_string().green().to_string()
    };
    format!(
        "{} created, {} existing, {} skipped, {}",
        push.created, push.existing, push.skipped, failed
    )
}
