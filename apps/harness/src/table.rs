use harness_process_supervisor::{ProcessStatus, ProcessSummary};

use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};

pub fn render(rows: &[ProcessSummary]) -> Table {
	let mut table = Table::new();

	table
		.load_preset(presets::UTF8_HORIZONTAL_ONLY)
		.set_content_arrangement(ContentArrangement::Dynamic)
		.set_header(
			ProcessSummary::HEADER
				.iter()
				.map(|title| Cell::new(title).add_attribute(Attribute::Bold)),
		);

	for row in rows {
		let status_color = match row.status {
			ProcessStatus::Running => Color::Green,
			ProcessStatus::Stopped => Color::Yellow,
			ProcessStatus::Defunct => Color::Red,
		};

		table.add_row(vec![
			Cell::new(&row.name).add_attribute(Attribute::Bold),
			Cell::new(row.status).fg(status_color),
			Cell::new(&row.metadata),
			Cell::new(&row.command),
		]);
	}

	table
}
