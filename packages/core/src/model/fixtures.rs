//! Small hand-built model used across unit tests.
//!
//! Features are `step`, `TRANSFER`, `amount`. Tree 0 splits on `amount < 1000`
//! (missing goes left, leaf -2.0), then `TRANSFER < 0.5` (leaves -0.5 / 2.0).
//! Tree 1 splits on `amount < 5000` (missing goes right, leaf 0.4), then
//! `step < 5` (leaves 0.3 / -0.1). A row is predicted positive exactly when
//! `amount >= 1000` and `TRANSFER == 1`.

use serde_json::{Value, json};

pub fn feature_names() -> Vec<String> {
    vec!["step".into(), "TRANSFER".into(), "amount".into()]
}

pub fn xgb_model(trained_names: &[&str]) -> Value {
    json!({
        "version": [2, 0, 3],
        "learner": {
            "feature_names": trained_names,
            "feature_types": [],
            "attributes": {},
            "gradient_booster": {
                "name": "gbtree",
                "model": {
                    "gbtree_model_param": {"num_parallel_tree": "1", "num_trees": "2"},
                    "iteration_indptr": [0, 1, 2],
                    "tree_info": [0, 0],
                    "trees": [
                        {
                            "id": 0,
                            "tree_param": {"num_deleted": "0", "num_feature": "3", "num_nodes": "5", "size_leaf_vector": "1"},
                            "base_weights": [0.0, -2.0, 0.5, -0.5, 2.0],
                            "categories": [],
                            "categories_nodes": [],
                            "categories_segments": [],
                            "categories_sizes": [],
                            "default_left": [1, 0, 0, 0, 0],
                            "left_children": [1, -1, 3, -1, -1],
                            "loss_changes": [10.0, 0.0, 4.0, 0.0, 0.0],
                            "parents": [2147483647, 0, 0, 2, 2],
                            "right_children": [2, -1, 4, -1, -1],
                            "split_conditions": [1000.0, -2.0, 0.5, -0.5, 2.0],
                            "split_indices": [2, 0, 1, 0, 0],
                            "split_type": [0, 0, 0, 0, 0],
                            "sum_hessian": [8.0, 3.0, 5.0, 2.0, 3.0]
                        },
                        {
                            "id": 1,
                            "tree_param": {"num_deleted": "0", "num_feature": "3", "num_nodes": "5", "size_leaf_vector": "1"},
                            "base_weights": [0.0, 0.1, 0.4, 0.3, -0.1],
                            "categories": [],
                            "categories_nodes": [],
                            "categories_segments": [],
                            "categories_sizes": [],
                            "default_left": [0, 1, 0, 0, 0],
                            "left_children": [1, 3, -1, -1, -1],
                            "loss_changes": [6.0, 3.0, 0.0, 0.0, 0.0],
                            "parents": [2147483647, 0, 0, 1, 1],
                            "right_children": [2, 4, -1, -1, -1],
                            "split_conditions": [5000.0, 5.0, 0.4, 0.3, -0.1],
                            "split_indices": [2, 0, 0, 0, 0],
                            "split_type": [0, 0, 0, 0, 0],
                            "sum_hessian": [8.0, 5.0, 3.0, 2.0, 3.0]
                        }
                    ]
                }
            },
            "learner_model_param": {
                "base_score": "5E-1",
                "boost_from_average": "1",
                "num_class": "0",
                "num_feature": "3",
                "num_target": "1"
            },
            "objective": {
                "name": "binary:logistic",
                "reg_loss_param": {"scale_pos_weight": "1"}
            }
        }
    })
}

pub fn pipeline(trained_names: &[&str]) -> Value {
    json!({ "steps": { "xgb": xgb_model(trained_names) } })
}
