//! Definitions sent to the search service when provisioning.
//!
//! The index schema mirrors [`todo_shared::SearchIndexEntry`]: `id` is the key,
//! text fields are searchable, `dueDate` and `tags` are facetable.

use serde_json::{json, Value};

use crate::config::{SearchServiceConfig, SUGGESTER_NAME};

/// Build the index definition with its suggester and CORS options.
pub fn index_definition(config: &SearchServiceConfig) -> Value {
    json!({
        "name": config.names.index,
        "fields": [
            {
                "name": "id",
                "type": "Edm.String",
                "key": true,
                "searchable": false,
                "filterable": false,
                "sortable": false,
                "facetable": false,
                "retrievable": true
            },
            {
                "name": "title",
                "type": "Edm.String",
                "key": false,
                "searchable": true,
                "filterable": false,
                "sortable": false,
                "facetable": false,
                "retrievable": true
            },
            {
                "name": "description",
                "type": "Edm.String",
                "key": false,
                "searchable": true,
                "filterable": false,
                "sortable": false,
                "facetable": false,
                "retrievable": true
            },
            {
                "name": "dueDate",
                "type": "Edm.DateTimeOffset",
                "key": false,
                "searchable": false,
                "filterable": true,
                "sortable": true,
                "facetable": true,
                "retrievable": true
            },
            {
                "name": "isComplete",
                "type": "Edm.Boolean",
                "key": false,
                "searchable": false,
                "filterable": false,
                "sortable": false,
                "facetable": false,
                "retrievable": true
            },
            {
                "name": "tags",
                "type": "Collection(Edm.String)",
                "key": false,
                "searchable": true,
                "filterable": true,
                "sortable": false,
                "facetable": true,
                "retrievable": true
            }
        ],
        "suggesters": [
            {
                "name": SUGGESTER_NAME,
                "searchMode": "analyzingInfixMatching",
                "sourceFields": ["title", "tags"]
            }
        ],
        "corsOptions": {
            "allowedOrigins": ["*"]
        }
    })
}

/// Build the data source definition the managed indexer pulls from.
pub fn datasource_definition(config: &SearchServiceConfig) -> Value {
    let datasource = &config.datasource;
    json!({
        "name": config.names.datasource,
        "type": datasource.kind,
        "credentials": {
            "connectionString": datasource.connection_string
        },
        "container": {
            "name": datasource.container
        },
        "dataChangeDetectionPolicy": {
            "@odata.type": "#Microsoft.Azure.Search.HighWaterMarkChangeDetectionPolicy",
            "highWaterMarkColumnName": datasource.high_water_mark_column
        }
    })
}

/// Build the indexer definition linking the data source to the index.
pub fn indexer_definition(config: &SearchServiceConfig) -> Value {
    json!({
        "name": config.names.indexer,
        "dataSourceName": config.names.datasource,
        "targetIndexName": config.names.index,
        "schedule": {
            "interval": config.indexer_interval
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SearchServiceConfig {
        SearchServiceConfig::new("https://search.example.net", "secret").unwrap()
    }

    fn field<'a>(definition: &'a Value, name: &str) -> &'a Value {
        definition["fields"]
            .as_array()
            .unwrap()
            .iter()
            .find(|f| f["name"] == name)
            .unwrap_or_else(|| panic!("missing field {}", name))
    }

    #[test]
    fn test_index_definition_structure() {
        let definition = index_definition(&config());

        assert_eq!(definition["name"], "todo");
        assert_eq!(definition["fields"].as_array().unwrap().len(), 6);
        assert_eq!(field(&definition, "id")["type"], "Edm.String");
        assert_eq!(field(&definition, "dueDate")["type"], "Edm.DateTimeOffset");
        assert_eq!(field(&definition, "tags")["type"], "Collection(Edm.String)");
        assert_eq!(field(&definition, "isComplete")["type"], "Edm.Boolean");
    }

    #[test]
    fn test_index_definition_sets_every_field_flag() {
        let definition = index_definition(&config());

        // (name, key, searchable, filterable, sortable, facetable)
        let expected = [
            ("id", true, false, false, false, false),
            ("title", false, true, false, false, false),
            ("description", false, true, false, false, false),
            ("dueDate", false, false, true, true, true),
            ("isComplete", false, false, false, false, false),
            ("tags", false, true, true, false, true),
        ];

        for (name, key, searchable, filterable, sortable, facetable) in expected {
            let f = field(&definition, name);
            assert_eq!(f["key"], json!(key), "{} key", name);
            assert_eq!(f["searchable"], json!(searchable), "{} searchable", name);
            assert_eq!(f["filterable"], json!(filterable), "{} filterable", name);
            assert_eq!(f["sortable"], json!(sortable), "{} sortable", name);
            assert_eq!(f["facetable"], json!(facetable), "{} facetable", name);
            assert_eq!(f["retrievable"], json!(true), "{} retrievable", name);
        }
    }

    #[test]
    fn test_index_definition_suggester_and_cors() {
        let definition = index_definition(&config());

        let suggester = &definition["suggesters"][0];
        assert_eq!(suggester["name"], "sg");
        assert_eq!(suggester["searchMode"], "analyzingInfixMatching");
        assert_eq!(suggester["sourceFields"], json!(["title", "tags"]));
        assert_eq!(definition["corsOptions"]["allowedOrigins"], json!(["*"]));
    }

    #[test]
    fn test_datasource_definition_uses_high_water_mark() {
        let mut config = config();
        config.datasource.connection_string = "AccountEndpoint=x;Database=todo".to_string();

        let definition = datasource_definition(&config);

        assert_eq!(definition["name"], "todo-datasource");
        assert_eq!(definition["type"], "documentdb");
        assert_eq!(
            definition["credentials"]["connectionString"],
            "AccountEndpoint=x;Database=todo"
        );
        assert_eq!(definition["container"]["name"], "items");
        assert_eq!(
            definition["dataChangeDetectionPolicy"]["highWaterMarkColumnName"],
            "_ts"
        );
    }

    #[test]
    fn test_indexer_definition_links_resources() {
        let definition = indexer_definition(&config());

        assert_eq!(definition["name"], "todo-indexer");
        assert_eq!(definition["dataSourceName"], "todo-datasource");
        assert_eq!(definition["targetIndexName"], "todo");
        assert_eq!(definition["schedule"]["interval"], "PT5M");
    }
}
