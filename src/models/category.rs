// src/models/category.rs

//! Monitored category registry.
//!
//! Categories mirror the "法定主动公开内容 > 主题分类" sections of the CAAC
//! site; the id is the `fl` search parameter. Each category is diffed and
//! persisted independently.

/// A monitored document collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Category {
    /// Search parameter value, also the snapshot partition key
    pub id: &'static str,
    /// Display name as shown on the site
    pub name: &'static str,
}

/// All monitored categories.
pub const CATEGORIES: &[Category] = &[
    Category { id: "9", name: "通知公告" },
    Category { id: "10", name: "政策发布" },
    Category { id: "11", name: "政策解读" },
    Category { id: "12", name: "统计数据" },
    Category { id: "47", name: "法律法规" },
    Category { id: "13", name: "民航规章" },
    Category { id: "14", name: "规范性文件" },
    Category { id: "15", name: "标准规范" },
    Category { id: "16", name: "对外关系" },
    Category { id: "17", name: "港澳台合作" },
    Category { id: "18", name: "国际公约" },
    Category { id: "19", name: "人事信息" },
    Category { id: "20", name: "财政信息" },
    Category { id: "21", name: "发展规划" },
    Category { id: "22", name: "重大项目" },
    Category { id: "23", name: "行政权力" },
    Category { id: "24", name: "政府公文" },
    Category { id: "25", name: "机构职能" },
    Category { id: "26", name: "对外政策" },
    Category { id: "27", name: "执法典型案例" },
    Category { id: "28", name: "建议提案答复" },
    Category { id: "29", name: "政府网站年度报表" },
];

/// Look up a category by id.
pub fn find_category(id: &str) -> Option<&'static Category> {
    CATEGORIES.iter().find(|c| c.id == id)
}

/// Display name for a category id, with a fallback for unknown ids
/// (old snapshots may hold categories no longer monitored).
pub fn category_display_name(id: &str) -> String {
    match find_category(id) {
        Some(category) => category.name.to_string(),
        None => format!("未知分类({id})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_known_category() {
        let cat = find_category("13").unwrap();
        assert_eq!(cat.name, "民航规章");
    }

    #[test]
    fn test_display_name_fallback() {
        assert_eq!(category_display_name("14"), "规范性文件");
        assert_eq!(category_display_name("999"), "未知分类(999)");
    }

    #[test]
    fn test_ids_are_unique() {
        let mut ids: Vec<&str> = CATEGORIES.iter().map(|c| c.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), CATEGORIES.len());
    }
}
