//! Built-in retailer rows

use super::RetailerConfig;

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

const BOT_WALL_MARKERS: &[&str] = &["captcha", "verify you are human", "acceso denegado"];

/// Returns the built-in rows in their canonical order (heb, soriana, walmart)
pub fn builtin_retailers() -> Vec<RetailerConfig> {
    vec![heb(), soriana(), walmart()]
}

fn heb() -> RetailerConfig {
    RetailerConfig {
        id: "heb".to_string(),
        domains: strings(&["*.heb.com.mx"]),
        link_selectors: strings(&[
            "a[href$=\"/p\"]",
            "a.product-card__link",
            "a[data-testid=\"productSummaryLink\"]",
            "a[href*=\"/p?\"]",
        ]),
        next_page_selectors: strings(&[
            "a[rel=\"next\"]",
            "link[rel=\"next\"]",
            "a.pagination-next",
            "a.pagination__next",
            "a[aria-label=\"Siguiente\"]",
        ]),
        price_selectors: strings(&[
            "div.price ::text",
            "span.price ::text",
            "[itemprop=\"price\"]::attr(content)",
        ]),
        sku_selectors: strings(&["[itemprop=\"sku\"]::attr(content)", "[data-sku]::attr(data-sku)"]),
        currency_selectors: strings(&[
            "meta[property=\"product:price:currency\"]::attr(content)",
            "meta[itemprop=\"priceCurrency\"]::attr(content)",
        ]),
        stock_selectors: strings(&[".in-stock", ".available", "[data-availability='inStock']"]),
        image_selectors: strings(&["img.product-image::attr(src)", "[itemprop=\"image\"]::attr(src)"]),
        non_product_path_markers: Vec::new(),
        product_url_pattern: Some(r"/p$".to_string()),
        sku_url_patterns: strings(&[r"/(\d+)/p$", r"-([0-9]{5,})/p$"]),
        base_search_url_template: Some("https://www.heb.com.mx/{slug}?_q={query}&map=ft".to_string()),
        category_urls: [
            "aceites-y-mantecas",
            "alimentos-enlatados-y-conservas",
            "sopas-y-pastas",
            "aderezos-y-salsas",
            "horneado-y-reposteria",
            "galletas",
            "cafe",
            "desechables",
            "untables-y-miel",
            "especias-y-condimentos",
            "arroz-frijol-y-semillas",
            "caldos-y-concentrados",
        ]
        .iter()
        .map(|slug| format!("https://www.heb.com.mx/despensa/{slug}"))
        .collect(),
        requires_rendering: false,
        listing_wait_selector: None,
        render_wait_selector: Some("div.price".to_string()),
        synthesize_page_param: false,
        bot_wall_markers: strings(BOT_WALL_MARKERS),
    }
}

fn soriana() -> RetailerConfig {
    RetailerConfig {
        id: "soriana".to_string(),
        domains: strings(&["*.soriana.com"]),
        link_selectors: strings(&[
            "a.vtex-product-summary-2-x-clearLink",
            "a.product-card__link",
            "a.product-item__link",
            "section [data-sku] a",
            "a[data-testid=\"productSummaryLink\"]",
            "a[href$=\".html\"]",
        ]),
        next_page_selectors: strings(&["a[rel=\"next\"]", "link[rel=\"next\"]"]),
        price_selectors: strings(&[
            "input#clevertap-price::attr(value)",
            "[itemprop=\"price\"]::attr(content)",
        ]),
        sku_selectors: strings(&[
            "[data-sku]::attr(data-sku)",
            ".sku::text",
            "[itemprop=\"sku\"]::attr(content)",
        ]),
        currency_selectors: strings(&["input#clevertap-currency::attr(value)"]),
        stock_selectors: strings(&[".in-stock", "[data-availability='inStock']"]),
        image_selectors: strings(&["img.product-image::attr(src)"]),
        non_product_path_markers: strings(&["/static-pages/", "/blog/", "/tiendas/", "/servicios/"]),
        product_url_pattern: Some(r"\.html$".to_string()),
        sku_url_patterns: strings(&[r"/(\d{5,})\.html$"]),
        base_search_url_template: Some("https://www.soriana.com/buscar?q={query}".to_string()),
        category_urls: strings(&["https://www.soriana.com/despensa/"]),
        requires_rendering: true,
        listing_wait_selector: Some(
            "a.vtex-product-summary-2-x-clearLink, a[data-testid='productSummaryLink'], a[href$='.html']"
                .to_string(),
        ),
        render_wait_selector: Some("#clevertap-price".to_string()),
        synthesize_page_param: false,
        bot_wall_markers: strings(BOT_WALL_MARKERS),
    }
}

fn walmart() -> RetailerConfig {
    RetailerConfig {
        id: "walmart".to_string(),
        domains: strings(&["*.walmart.com.mx"]),
        link_selectors: strings(&["a[href$=\"/p\"]", "a[data-testid=\"productSummaryLink\"]"]),
        next_page_selectors: strings(&[
            "link[rel=\"next\"]",
            "a[rel=\"next\"]",
            "a[aria-label*=\"Siguiente\"]",
        ]),
        price_selectors: strings(&[
            "[itemprop=\"price\"]::attr(content)",
            "span[data-automation-id=\"product-price\"] ::text",
        ]),
        sku_selectors: strings(&["[itemprop=\"sku\"]::attr(content)"]),
        currency_selectors: strings(&["meta[itemprop=\"priceCurrency\"]::attr(content)"]),
        stock_selectors: Vec::new(),
        image_selectors: strings(&["img[data-testid=\"hero-image\"]::attr(src)"]),
        non_product_path_markers: strings(&["/browse/", "/content/"]),
        product_url_pattern: Some(r"/p$".to_string()),
        sku_url_patterns: strings(&[r"[-_](\d{5,})/p$"]),
        base_search_url_template: Some("https://super.walmart.com.mx/search?q={query}".to_string()),
        category_urls: Vec::new(),
        requires_rendering: false,
        listing_wait_selector: None,
        render_wait_selector: Some("[itemprop=\"price\"]".to_string()),
        synthesize_page_param: true,
        bot_wall_markers: strings(BOT_WALL_MARKERS),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_ids_unique() {
        let rows = builtin_retailers();
        let mut ids: Vec<_> = rows.iter().map(|r| r.id.clone()).collect();
        ids.dedup();
        assert_eq!(ids.len(), rows.len());
    }

    #[test]
    fn test_heb_has_department_defaults() {
        let heb = heb();
        assert_eq!(heb.category_urls.len(), 12);
        assert!(heb.category_urls.iter().all(|u| u.starts_with("https://www.heb.com.mx/")));
    }

    #[test]
    fn test_soriana_renders_listings() {
        let soriana = soriana();
        assert!(soriana.requires_rendering);
        assert_eq!(soriana.render_wait_selector.as_deref(), Some("#clevertap-price"));
    }
}
