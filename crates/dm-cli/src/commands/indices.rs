//! `dm indices` command implementation

use crate::error::Result;
use comfy_table::{presets::UTF8_FULL, Cell, CellAlignment, ContentArrangement, Table};
use dm_common::types::{ClusterEndpoint, IndexInfo};
use dm_engine::TransferService;

/// Print every index of the cluster as a table
pub async fn run(service: &TransferService, endpoint: &ClusterEndpoint) -> Result<()> {
    let client = service.connect(endpoint)?;
    let indices = client.list_indices().await?;

    if indices.is_empty() {
        println!("No indices found on {}", endpoint);
        return Ok(());
    }

    println!("{}", render(&indices));
    let total: u64 = indices.iter().map(|i| i.document_count).sum();
    println!("{} indices, {} documents", indices.len(), total);

    Ok(())
}

pub fn render(indices: &[IndexInfo]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Index", "Docs", "Size", "Health", "Status", "Shards"]);

    for index in indices {
        table.add_row(vec![
            Cell::new(&index.name),
            Cell::new(index.document_count).set_alignment(CellAlignment::Right),
            Cell::new(&index.size).set_alignment(CellAlignment::Right),
            Cell::new(&index.health),
            Cell::new(&index.status),
            Cell::new(format!(
                "{}p/{}r",
                index.number_of_shards, index.number_of_replicas
            )),
        ]);
    }

    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_rows() {
        let indices = vec![IndexInfo {
            name: "logs-2024".to_string(),
            document_count: 1234,
            size: "1.2mb".to_string(),
            health: "green".to_string(),
            status: "open".to_string(),
            number_of_shards: 1,
            number_of_replicas: 0,
        }];

        let rendered = render(&indices).to_string();
        assert!(rendered.contains("logs-2024"));
        assert!(rendered.contains("1234"));
        assert!(rendered.contains("1p/0r"));
    }
}
